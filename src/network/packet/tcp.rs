// TCPフラグの定義
pub const TCP_FIN: u8 = 0x01;
pub const TCP_SYN: u8 = 0x02;
pub const TCP_RST: u8 = 0x04;
pub const TCP_PSH: u8 = 0x08;
pub const TCP_ACK: u8 = 0x10;
pub const TCP_URG: u8 = 0x20;

// フラグバイトはTCPヘッダ先頭から13バイト目
pub const TCP_FLAGS_OFFSET: usize = 13;

/// 新規接続の開始 (SYNのみ、ACKなし) かどうか
pub fn is_connection_start(flags: u8) -> bool {
    flags & TCP_SYN != 0 && flags & TCP_ACK == 0
}
