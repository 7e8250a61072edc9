use super::tcp::{is_connection_start, TCP_FLAGS_OFFSET};
use super::{Direction, Ipv4Token, NormalizedPacket, PortToken, Protocol};
use crate::core::error::PacketError;

pub const IPV4_MIN_HEADER_LEN: usize = 20;

const PROTOCOL_OFFSET: usize = 9;
const SRC_ADDR_OFFSET: usize = 12;
const DST_ADDR_OFFSET: usize = 16;

// 0                   1                   2                   3
// 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |Version|  IHL  |Type of Service|          Total Length         |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |         Identification        |Flags|      Fragment Offset    |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |  Time to Live |    Protocol   |         Header Checksum       |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |                       Source Address                          |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |                    Destination Address                        |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+

/// 生のIPv4パケットを正規化パケットに変換する。
///
/// 失敗した場合は部分的な結果を返さず、`PacketError` のみを返す。
/// アドレスとポートはワイヤ上のバイト列をそのまま保持する。
pub fn decode(data: &[u8], direction: Direction) -> Result<NormalizedPacket, PacketError> {
    if data.len() < IPV4_MIN_HEADER_LEN {
        return Err(PacketError::Truncated("IPv4ヘッダ"));
    }

    let version = data[0] >> 4;
    if version != 4 {
        return Err(PacketError::InvalidVersion(version));
    }

    let header_len = (data[0] & 0x0f) as usize * 4;
    if header_len < IPV4_MIN_HEADER_LEN || header_len > data.len() {
        return Err(PacketError::InvalidHeaderLength(header_len));
    }

    let protocol = Protocol::from_ip_protocol(data[PROTOCOL_OFFSET]);
    let src_ip = Ipv4Token::from_wire(read_array(data, SRC_ADDR_OFFSET));
    let dst_ip = Ipv4Token::from_wire(read_array(data, DST_ADDR_OFFSET));

    let mut packet = NormalizedPacket {
        direction,
        protocol,
        src_ip,
        dst_ip,
        ..NormalizedPacket::default()
    };

    // ポートを持つのはTCP/UDPのみ
    if !protocol.has_ports() {
        return Ok(packet);
    }

    if data.len() < header_len + 4 {
        return Err(PacketError::Truncated("L4ポート"));
    }
    packet.src_port = PortToken::from_wire(read_array(data, header_len));
    packet.dst_port = PortToken::from_wire(read_array(data, header_len + 2));

    packet.is_new_connection = match protocol {
        Protocol::Tcp => {
            if data.len() < header_len + TCP_FLAGS_OFFSET + 1 {
                return Err(PacketError::Truncated("TCPフラグ"));
            }
            is_connection_start(data[header_len + TCP_FLAGS_OFFSET])
        }
        // UDPは毎回新規フローの候補として扱い、重複は状態テーブル側で吸収する
        _ => true,
    };

    Ok(packet)
}

fn read_array<const N: usize>(data: &[u8], offset: usize) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&data[offset..offset + N]);
    out
}
