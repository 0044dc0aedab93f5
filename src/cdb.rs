//! MMC command descriptor block (CDB) builders (§6).
//!
//! Generalizes the teacher's fixed-opcode `GenericPacketCommand` enum
//! (`packet_commands.rs`) plus the per-operation ioctl wiring in
//! `platform/linux.rs` into a handful of CDB-builder functions that produce
//! the exact 10/12-byte command blocks `ScsiTransport` implementations pass
//! straight to SG_IO / a `SCSITask`. Layout follows the MMC opcode
//! assignments documented by `Eclypsed-ChromaDisc`'s `scsi-mmc-types.rs`
//! (`FormattedTOC`/`ReadCD` CDB construction).

/// READ TOC/PMA/ATIP, format 0x00 (simple TOC): first/last track + leadout.
pub const TOC_FORMAT_SIMPLE: u8 = 0x00;
/// READ TOC/PMA/ATIP, format 0x02 (Full TOC): POINT-based multi-session layout.
pub const TOC_FORMAT_FULL: u8 = 0x02;
/// READ TOC/PMA/ATIP, format 0x05 (CD-Text).
pub const TOC_FORMAT_CDTEXT: u8 = 0x05;

/// Build a READ TOC/PMA/ATIP (opcode 0x43) CDB.
///
/// `alloc_len` is the allocation length in bytes (big-endian in bytes 7-8).
#[must_use]
pub fn read_toc_cdb(format: u8, track_or_session: u8, alloc_len: u16) -> [u8; 10] {
    let len = alloc_len.to_be_bytes();
    [
        0x43,
        0x02, // MSF=0 (LBA addressing)
        format & 0x0F,
        0,
        0,
        0,
        track_or_session,
        len[0],
        len[1],
        0,
    ]
}

/// Sector type selector for READ CD byte 1 (bits 2-4); 0 = any type.
pub const READ_CD_SECTOR_TYPE_ANY: u8 = 0x00;
/// Byte 10 subchannel selector for 16-byte formatted Q.
pub const READ_CD_SUBCHANNEL_FORMATTED_Q: u8 = 0x02;

/// Build a READ CD (opcode 0xBE) CDB requesting formatted-Q subchannel data
/// for `count` sectors starting at `start_lba`.
#[must_use]
pub fn read_cd_q_cdb(start_lba: u32, count: u32) -> [u8; 12] {
    let lba = start_lba.to_be_bytes();
    let cnt = count.to_be_bytes();
    [
        0xBE,
        READ_CD_SECTOR_TYPE_ANY << 2,
        lba[0],
        lba[1],
        lba[2],
        lba[3],
        cnt[1],
        cnt[2],
        cnt[3],
        0x00, // no main channel data requested
        READ_CD_SUBCHANNEL_FORMATTED_Q,
        0x00,
    ]
}

/// READ SUB-CHANNEL (opcode 0x42) data format selector: current position.
pub const SUBCHANNEL_FORMAT_CURRENT_POSITION: u8 = 0x01;
/// READ SUB-CHANNEL data format selector: media catalog number.
pub const SUBCHANNEL_FORMAT_MCN: u8 = 0x02;
/// READ SUB-CHANNEL data format selector: ISRC.
pub const SUBCHANNEL_FORMAT_ISRC: u8 = 0x03;

/// Build a READ SUB-CHANNEL (opcode 0x42) CDB.
#[must_use]
pub fn read_subchannel_cdb(format: u8, track: u8, alloc_len: u16) -> [u8; 10] {
    let len = alloc_len.to_be_bytes();
    [
        0x42,
        0x00,
        0x40, // SUBQ: return subchannel data
        format,
        0,
        0,
        track,
        len[0],
        len[1],
        0,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn t_read_toc_cdb_opcode_and_format() {
        let cdb = read_toc_cdb(TOC_FORMAT_FULL, 1, 2048);
        assert_eq!(cdb[0], 0x43);
        assert_eq!(cdb[2] & 0x0F, TOC_FORMAT_FULL);
        assert_eq!(u16::from_be_bytes([cdb[7], cdb[8]]), 2048);
    }

    #[test]
    fn t_read_cd_q_cdb_subchannel_selector() {
        let cdb = read_cd_q_cdb(1000, 75);
        assert_eq!(cdb[0], 0xBE);
        assert_eq!(cdb[10], READ_CD_SUBCHANNEL_FORMATTED_Q);
        assert_eq!(u32::from_be_bytes([0, cdb[6], cdb[7], cdb[8]]), 75);
        assert_eq!(u32::from_be_bytes([cdb[2], cdb[3], cdb[4], cdb[5]]), 1000);
    }

    #[test]
    fn t_read_subchannel_cdb_format() {
        let cdb = read_subchannel_cdb(SUBCHANNEL_FORMAT_ISRC, 4, 24);
        assert_eq!(cdb[0], 0x42);
        assert_eq!(cdb[3], SUBCHANNEL_FORMAT_ISRC);
        assert_eq!(cdb[6], 4);
    }
}
