use crate::error::InitProcessError;
use pnet::datalink::{self, NetworkInterface};

// 名前が指定されていればそのデバイス、なければ最初の稼働中の非ループバックデバイス
pub fn select_device(name: Option<&str>) -> Result<NetworkInterface, InitProcessError> {
    let interfaces = datalink::interfaces();

    let selected = match name {
        Some(name) => interfaces.iter().find(|interface| interface.name == name),
        None => interfaces
            .iter()
            .find(|interface| interface.is_up() && !interface.is_loopback() && !interface.ips.is_empty()),
    };

    selected.cloned().ok_or_else(|| {
        let available: Vec<&str> = interfaces.iter().map(|i| i.name.as_str()).collect();
        InitProcessError::DeviceSelectionError(format!(
            "{} (利用可能なデバイス: {})",
            name.unwrap_or("自動選択"),
            available.join(", ")
        ))
    })
}
