// src/tables/io.rs
use std::{
    io::{BufWriter, Write},
    time::Instant,
};

use serde::{Deserialize, Serialize};
use serde_with::serde_as;

use super::{
    AcceptTables, Layout, Tables, Target,
    compress::CompressedTables,
    full::{FullSpeedEntry, FullSpeedTable, FullTable},
};

// -------------------- JSON (de)serialization --------------------

#[serde_as]
#[derive(Serialize, Deserialize)]
struct TablesDisk {
    #[serde_as(as = "[_; 256]")]
    ec: [u32; 256],
    numecs: u32,
    layout: Layout,
    accept: AcceptTables,
    start_states: Vec<u32>,
    end_of_buffer_state: Option<u32>,
    end_of_buffer_action: u32,
    lastdfa: u32,
}
impl From<&Tables> for TablesDisk {
    fn from(t: &Tables) -> Self {
        Self {
            ec: t.ec,
            numecs: t.numecs,
            layout: t.layout.clone(),
            accept: t.accept.clone(),
            start_states: t.start_states.clone(),
            end_of_buffer_state: t.end_of_buffer_state,
            end_of_buffer_action: t.end_of_buffer_action,
            lastdfa: t.lastdfa,
        }
    }
}
impl TablesDisk {
    fn into_tables(self) -> Tables {
        Tables {
            ec: self.ec,
            numecs: self.numecs,
            layout: self.layout,
            accept: self.accept,
            start_states: self.start_states,
            end_of_buffer_state: self.end_of_buffer_state,
            end_of_buffer_action: self.end_of_buffer_action,
            lastdfa: self.lastdfa,
        }
    }
}

pub fn save_tables_json(path: &std::path::Path, t: &Tables) -> std::io::Result<()> {
    // Stream to disk to avoid giant intermediate strings.
    let f = std::fs::File::create(path)?;
    let mut w = BufWriter::new(f);
    serde_json::to_writer(&mut w, &TablesDisk::from(t))?;
    w.flush()
}

pub fn tables_to_json_string(t: &Tables) -> Result<String, String> {
    serde_json::to_string(&TablesDisk::from(t)).map_err(|e| format!("Failed to encode tables: {e}"))
}

pub fn load_tables_json_bytes(data: &[u8]) -> Result<Tables, String> {
    serde_json::from_slice::<TablesDisk>(data)
        .map(|d| d.into_tables())
        .map_err(|e| format!("Failed to parse tables JSON: {e}"))
}

// -------------------- Compact binary (little-endian u32) --------------------
//   magic: 8 bytes = "LXSCAN01"
//   u32 x 6: numecs, lastdfa, eob state (0 = none), eob action, layout tag, accept tag
//   u16 x 256: ec map
//   vec: start states
//   accept tables, then the layout body
// A vec is a u32 length followed by that many u32 words.

const BIN_MAGIC: &[u8; 8] = b"LXSCAN01";
const JAM_WORD: u32 = u32::MAX;

const TAG_COMPRESSED: u32 = 0;
const TAG_FULL: u32 = 1;
const TAG_FULL_SPEED: u32 = 2;
const TAG_SINGLE: u32 = 0;
const TAG_SET: u32 = 1;

fn put_u32(w: &mut impl Write, v: u32) -> std::io::Result<()> {
    w.write_all(&v.to_le_bytes())
}

fn put_vec(w: &mut impl Write, v: &[u32]) -> std::io::Result<()> {
    put_u32(w, v.len() as u32)?;
    for &x in v {
        put_u32(w, x)?;
    }
    Ok(())
}

pub fn encode_tables_bin(t: &Tables, w: &mut impl Write) -> std::io::Result<()> {
    let layout_tag = match t.layout {
        Layout::Compressed(_) => TAG_COMPRESSED,
        Layout::Full(_) => TAG_FULL,
        Layout::FullSpeed(_) => TAG_FULL_SPEED,
    };
    let accept_tag = match t.accept {
        AcceptTables::Single { .. } => TAG_SINGLE,
        AcceptTables::Set { .. } => TAG_SET,
    };

    w.write_all(BIN_MAGIC)?;
    put_u32(w, t.numecs)?;
    put_u32(w, t.lastdfa)?;
    put_u32(w, t.end_of_buffer_state.unwrap_or(0))?;
    put_u32(w, t.end_of_buffer_action)?;
    put_u32(w, layout_tag)?;
    put_u32(w, accept_tag)?;

    // ec map: 256 x u16 (chunk is tiny)
    {
        let mut buf = [0u8; 256 * 2];
        for (i, &ec) in t.ec.iter().enumerate() {
            let v = u16::try_from(ec).map_err(|_| {
                std::io::Error::new(std::io::ErrorKind::InvalidData, "ec > u16::MAX")
            })?;
            let p = i * 2;
            buf[p..p + 2].copy_from_slice(&v.to_le_bytes());
        }
        w.write_all(&buf)?;
    }

    put_vec(w, &t.start_states)?;

    match &t.accept {
        AcceptTables::Single { accept } => put_vec(w, accept)?,
        AcceptTables::Set { accept, acclist } => {
            put_vec(w, accept)?;
            put_vec(w, acclist)?;
        }
    }

    match &t.layout {
        Layout::Compressed(ct) => {
            put_vec(w, &ct.base)?;
            put_vec(w, &ct.def)?;
            put_vec(w, &ct.nxt)?;
            put_vec(w, &ct.chk)?;
            match &ct.meta {
                Some(meta) => {
                    put_u32(w, 1)?;
                    put_vec(w, meta)?;
                }
                None => put_u32(w, 0)?,
            }
            for v in [ct.jamstate, ct.jambase, ct.lastdfa, ct.numtemps, ct.nummecs] {
                put_u32(w, v)?;
            }
        }
        Layout::Full(ft) => {
            put_u32(w, ft.width)?;
            let words: Vec<u32> = ft
                .nxt
                .iter()
                .map(|t| match t {
                    Target::Jam => JAM_WORD,
                    Target::State(s) => *s,
                })
                .collect();
            put_vec(w, &words)?;
        }
        Layout::FullSpeed(fs) => {
            put_u32(w, fs.numecs)?;
            put_u32(w, fs.eob_base)?;
            put_vec(w, &fs.base)?;
            put_u32(w, fs.entries.len() as u32)?;
            for e in &fs.entries {
                put_u32(w, e.verify)?;
                w.write_all(&e.next.to_le_bytes())?;
            }
        }
    }
    Ok(())
}

pub fn save_tables_bin(path: &std::path::Path, t: &Tables) -> std::io::Result<()> {
    let instant = Instant::now();
    let f = std::fs::File::create(path)?;
    let mut w = BufWriter::new(f);
    encode_tables_bin(t, &mut w)?;
    let flush = w.flush();
    log::info!(
        "Saved tables to {} in {} ms",
        path.display(),
        instant.elapsed().as_millis()
    );
    flush
}

#[inline]
fn take_u32(buf: &mut &[u8]) -> Result<u32, String> {
    if buf.len() < 4 {
        return Err("truncated u32".into());
    }
    let mut le = [0u8; 4];
    le.copy_from_slice(&buf[..4]);
    *buf = &buf[4..];
    Ok(u32::from_le_bytes(le))
}

#[inline]
fn take_u16(buf: &mut &[u8]) -> Result<u16, String> {
    if buf.len() < 2 {
        return Err("truncated u16".into());
    }
    let mut le = [0u8; 2];
    le.copy_from_slice(&buf[..2]);
    *buf = &buf[2..];
    Ok(u16::from_le_bytes(le))
}

fn take_vec(buf: &mut &[u8]) -> Result<Vec<u32>, String> {
    let n = take_u32(buf)? as usize;
    if buf.len() / 4 < n {
        return Err(format!("truncated vec of {n} words"));
    }
    let mut out = Vec::with_capacity(n);
    for _ in 0..n {
        out.push(take_u32(buf)?);
    }
    Ok(out)
}

pub fn load_tables_bin_bytes(mut data: &[u8]) -> Result<Tables, String> {
    if data.len() < 8 + 4 * 6 {
        return Err("bin too short".into());
    }
    let mut magic = [0u8; 8];
    magic.copy_from_slice(&data[..8]);
    if &magic != BIN_MAGIC {
        return Err("bad magic in tables .bin".into());
    }
    data = &data[8..];

    let numecs = take_u32(&mut data)?;
    let lastdfa = take_u32(&mut data)?;
    let eob_state = take_u32(&mut data)?;
    let end_of_buffer_action = take_u32(&mut data)?;
    let layout_tag = take_u32(&mut data)?;
    let accept_tag = take_u32(&mut data)?;

    let mut ec = [0u32; 256];
    for slot in ec.iter_mut() {
        *slot = take_u16(&mut data)? as u32;
    }

    let start_states = take_vec(&mut data)?;

    let accept = match accept_tag {
        TAG_SINGLE => AcceptTables::Single {
            accept: take_vec(&mut data)?,
        },
        TAG_SET => {
            let accept = take_vec(&mut data)?;
            let acclist = take_vec(&mut data)?;
            AcceptTables::Set { accept, acclist }
        }
        other => return Err(format!("unknown accept tag {other}")),
    };

    let layout = match layout_tag {
        TAG_COMPRESSED => {
            let base = take_vec(&mut data)?;
            let def = take_vec(&mut data)?;
            let nxt = take_vec(&mut data)?;
            let chk = take_vec(&mut data)?;
            let meta = match take_u32(&mut data)? {
                0 => None,
                _ => Some(take_vec(&mut data)?),
            };
            Layout::Compressed(CompressedTables {
                base,
                def,
                nxt,
                chk,
                meta,
                jamstate: take_u32(&mut data)?,
                jambase: take_u32(&mut data)?,
                lastdfa: take_u32(&mut data)?,
                numtemps: take_u32(&mut data)?,
                nummecs: take_u32(&mut data)?,
            })
        }
        TAG_FULL => {
            let width = take_u32(&mut data)?;
            let nxt = take_vec(&mut data)?
                .into_iter()
                .map(|v| if v == JAM_WORD { Target::Jam } else { Target::State(v) })
                .collect();
            Layout::Full(FullTable { width, nxt })
        }
        TAG_FULL_SPEED => {
            let numecs = take_u32(&mut data)?;
            let eob_base = take_u32(&mut data)?;
            let base = take_vec(&mut data)?;
            let n = take_u32(&mut data)? as usize;
            if data.len() / 8 < n {
                return Err(format!("truncated full-speed table of {n} entries"));
            }
            let mut entries = Vec::with_capacity(n);
            for _ in 0..n {
                let verify = take_u32(&mut data)?;
                let next = take_u32(&mut data)? as i32;
                entries.push(FullSpeedEntry { verify, next });
            }
            Layout::FullSpeed(FullSpeedTable {
                entries,
                base,
                eob_base,
                numecs,
            })
        }
        other => return Err(format!("unknown layout tag {other}")),
    };

    if !data.is_empty() {
        return Err(format!("{} trailing bytes after tables", data.len()));
    }

    Ok(Tables {
        ec,
        numecs,
        layout,
        accept,
        start_states,
        end_of_buffer_state: (eob_state != 0).then_some(eob_state),
        end_of_buffer_action,
        lastdfa,
    })
}
