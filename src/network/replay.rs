use crate::core::error::{FirewallError, FirewallResult};
use crate::core::memory::MemorySource;
use crate::network::capture::frame_to_packet;
use crate::network::packet::Direction;
use log::{debug, warn};
use std::io;
use std::path::Path;

// pcapファイル (libpcap形式) のリプレイ。
//
// グローバルヘッダ (24バイト):
//   magic(4) version_major(2) version_minor(2) thiszone(4) sigfigs(4) snaplen(4) linktype(4)
// レコードヘッダ (16バイト):
//   ts_sec(4) ts_frac(4) incl_len(4) orig_len(4)
//
// 数値のバイト順はmagicの並びで判定する。

const MAGIC_MICROS: u32 = 0xa1b2_c3d4;
const MAGIC_NANOS: u32 = 0xa1b2_3c4d;
const GLOBAL_HEADER_LEN: usize = 24;
const RECORD_HEADER_LEN: usize = 16;
const LINKTYPE_OFFSET: usize = 20;
const INCL_LEN_OFFSET: usize = 8;

pub const LINKTYPE_ETHERNET: u32 = 1;
pub const LINKTYPE_RAW: u32 = 101;

pub fn load_pcap(path: impl AsRef<Path>, direction: Direction) -> FirewallResult<MemorySource> {
    let data = std::fs::read(path)?;
    parse_pcap(&data, direction)
}

/// pcapのバイト列からIPv4パケットだけを取り出して `MemorySource` に積む。
///
/// イーサネットとraw IPのリンクタイプに対応する。IPv4以外のフレームは
/// 読み飛ばす。末尾のレコードが途中で切れている場合は、そこまでを返す。
pub fn parse_pcap(data: &[u8], direction: Direction) -> FirewallResult<MemorySource> {
    if data.len() < GLOBAL_HEADER_LEN {
        return Err(invalid("pcapヘッダが短すぎます".to_string()));
    }

    let magic = [data[0], data[1], data[2], data[3]];
    let big_endian = match (u32::from_le_bytes(magic), u32::from_be_bytes(magic)) {
        (MAGIC_MICROS | MAGIC_NANOS, _) => false,
        (_, MAGIC_MICROS | MAGIC_NANOS) => true,
        _ => return Err(invalid(format!("pcapファイルではありません: magic={:02x?}", magic))),
    };
    let read_u32 = |offset: usize| {
        let bytes = [data[offset], data[offset + 1], data[offset + 2], data[offset + 3]];
        if big_endian {
            u32::from_be_bytes(bytes)
        } else {
            u32::from_le_bytes(bytes)
        }
    };

    let link_type = read_u32(LINKTYPE_OFFSET);
    if link_type != LINKTYPE_ETHERNET && link_type != LINKTYPE_RAW {
        return Err(invalid(format!("未サポートのリンクタイプです: {}", link_type)));
    }

    let mut source = MemorySource::new();
    let mut offset = GLOBAL_HEADER_LEN;
    let mut records = 0usize;

    while offset < data.len() {
        if data.len() - offset < RECORD_HEADER_LEN {
            warn!("レコードヘッダが途中で切れています: オフセット={}", offset);
            break;
        }
        let len = read_u32(offset + INCL_LEN_OFFSET) as usize;
        let start = offset + RECORD_HEADER_LEN;
        let Some(record) = data.get(start..start.saturating_add(len)) else {
            warn!("レコードが途中で切れています: オフセット={}", offset);
            break;
        };
        offset = start + len;
        records += 1;

        let payload = match link_type {
            LINKTYPE_ETHERNET => frame_to_packet(record, None, 0).map(|packet| packet.data),
            _ => Some(bytes::Bytes::copy_from_slice(record)),
        };
        match payload {
            Some(payload) => {
                source.push(direction, payload);
            }
            None => debug!("IPv4以外のフレームを読み飛ばします: レコード#{}", records),
        }
    }

    debug!("pcapを読み込みました: レコード={} パケット={}", records, source.remaining());
    Ok(source)
}

fn invalid(message: String) -> FirewallError {
    FirewallError::Capture(io::Error::new(io::ErrorKind::InvalidData, message))
}
