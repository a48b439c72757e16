//! Palm Database (PDB) container parsing.
//!
//! Both PalmDoc (`TEXtREAd`) and MOBI (`BOOKMOBI`) ebooks live inside a PDB
//! shell: a 78-byte header, a record list of 8-byte entries, then the record
//! payloads back to back.

use crate::error::{Error, Result};

const HEADER_LEN: usize = 78;
const RECORD_ENTRY_LEN: usize = 8;

/// A parsed PDB container, borrowing record slices from the input buffer.
#[derive(Debug)]
pub struct PdbFile<'a> {
    /// Database name (NUL-padded 32-byte field, trimmed).
    pub name: String,
    /// Type and creator four-CCs, e.g. `TEXt`/`REAd` or `BOOK`/`MOBI`.
    pub type_creator: [u8; 8],
    records: Vec<&'a [u8]>,
}

impl<'a> PdbFile<'a> {
    pub fn parse(data: &'a [u8]) -> Result<Self> {
        if data.len() < HEADER_LEN + RECORD_ENTRY_LEN {
            return Err(Error::CorruptContainer("PDB header truncated".into()));
        }

        let name_field = &data[0..32];
        let name_end = memchr::memchr(0, name_field).unwrap_or(32);
        let name = String::from_utf8_lossy(&name_field[..name_end])
            .trim()
            .to_string();

        let mut type_creator = [0u8; 8];
        type_creator.copy_from_slice(&data[0x3C..0x44]);

        let record_count = u16::from_be_bytes([data[0x4C], data[0x4D]]) as usize;
        let list_end = HEADER_LEN + record_count * RECORD_ENTRY_LEN;
        if record_count == 0 || data.len() < list_end {
            return Err(Error::CorruptContainer(format!(
                "PDB record list truncated ({} records declared)",
                record_count
            )));
        }

        // Each entry: 4-byte offset, 1-byte attributes, 3-byte unique id.
        let mut offsets = Vec::with_capacity(record_count);
        for k in 0..record_count {
            let at = HEADER_LEN + k * RECORD_ENTRY_LEN;
            let offset =
                u32::from_be_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]]) as usize;
            if offset > data.len() {
                return Err(Error::CorruptContainer(format!(
                    "record {} offset {} beyond end of file",
                    k, offset
                )));
            }
            offsets.push(offset);
        }

        let mut records = Vec::with_capacity(record_count);
        for k in 0..record_count {
            let start = offsets[k];
            let end = offsets.get(k + 1).copied().unwrap_or(data.len());
            if end < start {
                return Err(Error::CorruptContainer(format!(
                    "record {} offsets out of order",
                    k
                )));
            }
            records.push(&data[start..end]);
        }

        Ok(Self {
            name,
            type_creator,
            records,
        })
    }

    pub fn record(&self, index: usize) -> Option<&'a [u8]> {
        self.records.get(index).copied()
    }

    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    pub fn is_palmdoc(&self) -> bool {
        &self.type_creator == b"TEXtREAd"
    }

    pub fn is_mobi(&self) -> bool {
        &self.type_creator == b"BOOKMOBI"
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    /// Assemble a minimal PDB image from records.
    pub fn build_pdb(name: &str, type_creator: &[u8; 8], records: &[&[u8]]) -> Vec<u8> {
        let mut data = vec![0u8; 78];
        let name_bytes = name.as_bytes();
        data[..name_bytes.len().min(32)].copy_from_slice(&name_bytes[..name_bytes.len().min(32)]);
        data[0x3C..0x44].copy_from_slice(type_creator);
        data[0x4C..0x4E].copy_from_slice(&(records.len() as u16).to_be_bytes());

        let list_len = records.len() * 8;
        let mut offset = 78 + list_len;
        for (k, record) in records.iter().enumerate() {
            data.extend_from_slice(&(offset as u32).to_be_bytes());
            data.push(0);
            data.extend_from_slice(&[0, 0, k as u8]);
            offset += record.len();
        }
        for record in records {
            data.extend_from_slice(record);
        }
        data
    }
}
