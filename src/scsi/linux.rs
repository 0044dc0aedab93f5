//! Linux SCSI transport via SG_IO passthrough (§4.1, §9).
//!
//! Generalizes the teacher's per-operation `nix::ioctl_*_bad!` wiring
//! (`platform/linux.rs`) to a single SG_IO passthrough ioctl that carries an
//! arbitrary CDB, mirroring the teacher's `GenericCommand` struct shape
//! (`packet_commands.rs`) but against the real Linux `sg_io_hdr_t` layout
//! instead of the legacy `cdrom_generic_command`.

use std::ffi::c_void;
use std::fs::OpenOptions;
use std::os::fd::{IntoRawFd, RawFd};
use std::os::unix::fs::OpenOptionsExt;

use nix::libc;

use crate::cdb;
use crate::config;
use crate::error::{IoError, MbDiscIdError};
use crate::qsubchannel::QSubchannel;

use super::{parse_full_toc_descriptors, FullTocDescriptor, ScsiTransport};

const SG_IO: u64 = 0x2285;
const SG_DXFER_FROM_DEV: i32 = -3;
const SG_INTERFACE_ID_S: i32 = b'S' as i32;

#[repr(C)]
struct SgIoHdr {
    interface_id: i32,
    dxfer_direction: i32,
    cmd_len: u8,
    mx_sb_len: u8,
    iovec_count: u16,
    dxfer_len: u32,
    dxferp: *mut c_void,
    cmdp: *const u8,
    sbp: *mut u8,
    timeout: u32,
    flags: u32,
    pack_id: i32,
    usr_ptr: *mut c_void,
    status: u8,
    maskedstatus: u8,
    msg_status: u8,
    sb_len_wr: u8,
    host_status: u16,
    driver_status: u16,
    resid: i32,
    duration: u32,
    info: u32,
}

nix::ioctl_readwrite_bad!(sg_io_ioctl, SG_IO, SgIoHdr);

pub struct LinuxTransport {
    fd: RawFd,
}

impl LinuxTransport {
    fn scsi_read(&mut self, cdb: &[u8], alloc_len: usize) -> Result<Vec<u8>, MbDiscIdError> {
        let mut buf = vec![0u8; alloc_len];
        let mut sense = [0u8; 32];

        let mut hdr = SgIoHdr {
            interface_id: SG_INTERFACE_ID_S,
            dxfer_direction: SG_DXFER_FROM_DEV,
            cmd_len: cdb.len() as u8,
            mx_sb_len: sense.len() as u8,
            iovec_count: 0,
            dxfer_len: alloc_len as u32,
            dxferp: buf.as_mut_ptr().cast::<c_void>(),
            cmdp: cdb.as_ptr(),
            sbp: sense.as_mut_ptr(),
            timeout: (config::SCSI_TIMEOUT_SECS * 1000) as u32,
            flags: 0,
            pack_id: 0,
            usr_ptr: std::ptr::null_mut(),
            status: 0,
            maskedstatus: 0,
            msg_status: 0,
            sb_len_wr: 0,
            host_status: 0,
            driver_status: 0,
            resid: 0,
            duration: 0,
            info: 0,
        };

        // Safety: `hdr` borrows `buf`, `cdb`, and `sense`, all of which
        // outlive the ioctl call, and the kernel only reads/writes within
        // the declared lengths.
        unsafe {
            sg_io_ioctl(self.fd, &mut hdr)?;
        }

        if hdr.status != 0 {
            let sense_key = if sense.len() > 2 { sense[2] & 0x0F } else { 0 };
            let asc = if sense.len() > 12 { sense[12] } else { 0 };
            let ascq = if sense.len() > 13 { sense[13] } else { 0 };
            log::debug!(
                "SCSI command {:#x} failed: status={} sense_key={sense_key:#x}",
                cdb[0],
                hdr.status
            );
            return Err(MbDiscIdError::Io(IoError::Scsi {
                status: i32::from(hdr.status),
                sense_key,
                asc,
                ascq,
            }));
        }

        let used = alloc_len.saturating_sub(hdr.resid.max(0) as usize);
        buf.truncate(used);
        Ok(buf)
    }
}

impl ScsiTransport for LinuxTransport {
    fn open(path: &str) -> Result<Self, MbDiscIdError> {
        let file = OpenOptions::new()
            .read(true)
            .custom_flags(libc::O_NONBLOCK | libc::O_RDONLY)
            .open(path)
            .map_err(|e| {
                MbDiscIdError::Io(IoError::DeviceOpen {
                    path: path.to_owned(),
                    reason: e.to_string(),
                })
            })?;
        log::debug!("opened {path}");
        Ok(Self {
            fd: file.into_raw_fd(),
        })
    }

    fn read_full_toc(&mut self) -> Result<Vec<FullTocDescriptor>, MbDiscIdError> {
        // Large enough for every session marker plus up to 99 tracks.
        let alloc_len = 4 + 11 * 3 * 33;
        let raw = self.scsi_read(&cdb::read_toc_cdb(cdb::TOC_FORMAT_FULL, 1, alloc_len as u16), alloc_len)?;
        if raw.len() < 4 {
            return Err(MbDiscIdError::Io(IoError::TocRead(
                "full TOC response too short".to_owned(),
            )));
        }
        Ok(parse_full_toc_descriptors(&raw[4..]))
    }

    fn read_toc_simple(&mut self) -> Result<(u8, u8, u32), MbDiscIdError> {
        let alloc_len = 4 + 8 * 99;
        let raw = self.scsi_read(&cdb::read_toc_cdb(cdb::TOC_FORMAT_SIMPLE, 0, alloc_len as u16), alloc_len)?;
        if raw.len() < 4 {
            return Err(MbDiscIdError::Io(IoError::TocRead(
                "simple TOC response too short".to_owned(),
            )));
        }
        let first = raw[2];
        let last = raw[3];
        // Leadout is the descriptor with track number 0xAA.
        for chunk in raw[4..].chunks_exact(8) {
            if chunk[2] == 0xAA {
                let lba = u32::from_be_bytes([chunk[4], chunk[5], chunk[6], chunk[7]]);
                return Ok((first, last, lba));
            }
        }
        Err(MbDiscIdError::Io(IoError::TocRead(
            "no leadout descriptor in simple TOC".to_owned(),
        )))
    }

    fn read_cdtext_raw(&mut self) -> Result<Vec<u8>, MbDiscIdError> {
        let header = self.scsi_read(&cdb::read_toc_cdb(cdb::TOC_FORMAT_CDTEXT, 0, 4), 4)?;
        if header.len() < 2 {
            return Ok(Vec::new());
        }
        let data_len = usize::from(u16::from_be_bytes([header[0], header[1]]));
        if data_len < 2 || (data_len - 2) % config::CDTEXT_PACK_BYTES != 0 || data_len + 2 > config::CDTEXT_MAX_BYTES {
            log::warn!("CD-Text length {data_len} rejected by §4.1 validation");
            return Ok(Vec::new());
        }
        let total = data_len + 2;
        let raw = self.scsi_read(&cdb::read_toc_cdb(cdb::TOC_FORMAT_CDTEXT, 0, total as u16), total)?;
        if raw.len() < 4 {
            return Ok(Vec::new());
        }
        Ok(raw[4..].to_vec())
    }

    fn read_q_batch(&mut self, start_lba: u32, count: u32) -> Result<Vec<QSubchannel>, MbDiscIdError> {
        let mut out = Vec::with_capacity(count as usize);
        let mut remaining = count;
        let mut lba = start_lba;
        let mut any_ok = false;

        while remaining > 0 {
            let chunk = remaining.min(config::READ_CD_CHUNK_SECTORS as u32);
            let alloc_len = chunk as usize * config::Q_SUBCHANNEL_BYTES;
            match self.scsi_read(&cdb::read_cd_q_cdb(lba, chunk), alloc_len) {
                Ok(raw) => {
                    any_ok = true;
                    for frame in raw.chunks_exact(config::Q_SUBCHANNEL_BYTES) {
                        let mut buf = [0u8; 16];
                        buf.copy_from_slice(frame);
                        out.push(QSubchannel::decode(&buf));
                    }
                }
                Err(e) => {
                    log::debug!("tranche read at LBA {lba} failed: {e}");
                }
            }
            lba += chunk;
            remaining -= chunk;
        }

        if !any_ok && count > 0 {
            return Err(MbDiscIdError::Io(IoError::TocRead(
                "all tranche chunks failed".to_owned(),
            )));
        }
        Ok(out)
    }

    fn read_isrc_via_drive(&mut self, track: u8) -> Option<String> {
        let raw = self
            .scsi_read(
                &cdb::read_subchannel_cdb(cdb::SUBCHANNEL_FORMAT_ISRC, track, 24),
                24,
            )
            .ok()?;
        if raw.len() < 16 {
            return None;
        }
        // Track subchannel data format: 4-byte header then ISRC payload
        // starting at the TCVAL flag (byte 8), ISRC digits at bytes 9..21.
        let valid = raw[8] & 0x80 != 0;
        if !valid {
            return None;
        }
        let isrc: String = raw
            .get(9..21)?
            .iter()
            .map(|&b| b as char)
            .collect();
        crate::qsubchannel::is_valid_isrc(&isrc).then_some(isrc)
    }

    fn read_mcn_via_drive(&mut self) -> Option<String> {
        let raw = self
            .scsi_read(&cdb::read_subchannel_cdb(cdb::SUBCHANNEL_FORMAT_MCN, 0, 24), 24)
            .ok()?;
        if raw.len() < 24 {
            return None;
        }
        let valid = raw[8] & 0x80 != 0;
        if !valid {
            return None;
        }
        let mcn: String = raw.get(9..22)?.iter().map(|&b| b as char).collect();
        let mcn = mcn.trim_end_matches('\0').to_owned();
        (!mcn.is_empty() && mcn.bytes().all(|b| b.is_ascii_digit())).then_some(mcn)
    }
}

impl Drop for LinuxTransport {
    fn drop(&mut self) {
        // Safety: `fd` was obtained from `OpenOptions::open` and is not
        // used again after this point.
        unsafe {
            libc::close(self.fd);
        }
    }
}
