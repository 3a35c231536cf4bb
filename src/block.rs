use cid::Cid;
use std::io::{Cursor, Read, Write};
use crate::header::{read_section, read_section_len, write_section_len, CarError};

/// One archive section: an identifier paired with the raw bytes it names.
///
/// The CID is only ever displayed or used to derive a fallback record key;
/// it is never checked against the bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub cid:  Cid,
    pub data: Vec<u8>,
}

impl Block {
    pub fn new(cid: Cid, data: Vec<u8>) -> Self {
        Self { cid, data }
    }

    /// Read the next section.  `Ok(None)` means the stream ended cleanly
    /// on a section boundary.
    pub fn read<R: Read>(mut reader: R) -> Result<Option<Self>, CarError> {
        let len = match read_section_len(&mut reader)? {
            Some(len) => len,
            None      => return Ok(None),
        };
        let section = read_section(&mut reader, len)?;

        let mut cursor = Cursor::new(section.as_slice());
        let cid = Cid::read_bytes(&mut cursor)?;
        let data = section[cursor.position() as usize..].to_vec();
        Ok(Some(Self { cid, data }))
    }

    pub fn write<W: Write>(&self, mut writer: W) -> Result<(), CarError> {
        let cid = self.cid.to_bytes();
        write_section_len(&mut writer, (cid.len() + self.data.len()) as u64)?;
        writer.write_all(&cid)?;
        writer.write_all(&self.data)?;
        Ok(())
    }
}
