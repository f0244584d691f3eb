//! Windows-only lookups: WMI network adapters, the registry power scheme,
//! the IP Helper adapter table and the AC line status.

use super::{AdapterRecord, AdapterRegistry, LinkStats, SchemeStore};
use crate::error::{Result, TelemetryError};
use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use windows_sys::Win32::Foundation::{ERROR_BUFFER_OVERFLOW, NO_ERROR};
use windows_sys::Win32::NetworkManagement::IpHelper::{
    GetAdaptersAddresses, GAA_FLAG_SKIP_ANYCAST, GAA_FLAG_SKIP_DNS_SERVER, GAA_FLAG_SKIP_MULTICAST,
    IP_ADAPTER_ADDRESSES_LH,
};
use windows_sys::Win32::NetworkManagement::Ndis::IfOperStatusUp;
use windows_sys::Win32::Networking::WinSock::{AF_INET, AF_INET6, AF_UNSPEC, SOCKADDR, SOCKADDR_IN, SOCKADDR_IN6};
use windows_sys::Win32::System::Power::{GetSystemPowerStatus, SYSTEM_POWER_STATUS};
use winreg::enums::HKEY_LOCAL_MACHINE;
use winreg::RegKey;
use wmi::WMIConnection;

const POWER_SCHEMES_KEY: &str = r"SYSTEM\CurrentControlSet\Control\Power\User\PowerSchemes";

#[derive(Deserialize, Debug)]
#[serde(rename = "Win32_NetworkAdapter")]
#[serde(rename_all = "PascalCase")]
struct Win32NetworkAdapter {
    name: Option<String>,
    #[serde(rename = "MACAddress")]
    mac_address: Option<String>,
    #[serde(rename = "NetConnectionID")]
    net_connection_id: Option<String>,
    net_connection_status: Option<u16>,
}

/// Network adapter registry backed by a WMI connection
pub struct WmiRegistry {
    connection: WMIConnection,
}

impl WmiRegistry {
    pub fn connect() -> Result<Self> {
        let connection = WMIConnection::new()
            .map_err(|e| TelemetryError::registry(format!("Failed to connect to WMI: {}", e)))?;
        Ok(Self { connection })
    }
}

impl AdapterRegistry for WmiRegistry {
    fn network_adapters(&self) -> Result<Vec<AdapterRecord>> {
        let adapters: Vec<Win32NetworkAdapter> = self
            .connection
            .query()
            .map_err(|e| TelemetryError::registry(format!("WMI query failed: {}", e)))?;

        Ok(adapters
            .into_iter()
            .map(|adapter| AdapterRecord {
                name: adapter.name,
                mac_address: adapter.mac_address,
                connection_id: adapter.net_connection_id,
                connection_status: adapter.net_connection_status,
            })
            .collect())
    }
}

/// Reads `ActivePowerScheme` from HKLM
pub struct PowerSchemeRegistry;

impl SchemeStore for PowerSchemeRegistry {
    fn active_power_scheme(&self) -> Result<String> {
        let hklm = RegKey::predef(HKEY_LOCAL_MACHINE);
        let schemes = hklm.open_subkey(POWER_SCHEMES_KEY)?;
        let active: String = schemes.get_value("ActivePowerScheme")?;
        Ok(active)
    }
}

/// One adapter from `GetAdaptersAddresses`
pub struct InterfaceEntry {
    /// Friendly name, as sysinfo and `NetConnectionID` report it
    pub name: String,
    /// Unicast addresses in the order Windows lists them
    pub addrs: Vec<IpAddr>,
    pub link: LinkStats,
}

/// The IP Helper adapter table, in enumeration order
pub fn interface_table() -> Result<Vec<InterfaceEntry>> {
    let flags = GAA_FLAG_SKIP_ANYCAST | GAA_FLAG_SKIP_MULTICAST | GAA_FLAG_SKIP_DNS_SERVER;
    let mut size: u32 = 16 * 1024;

    // u64 storage keeps the adapter records aligned
    let buffer = loop {
        let mut buffer = vec![0u64; (size as usize).div_ceil(8)];
        let result = unsafe {
            GetAdaptersAddresses(
                u32::from(AF_UNSPEC),
                flags,
                std::ptr::null(),
                buffer.as_mut_ptr() as *mut IP_ADAPTER_ADDRESSES_LH,
                &mut size,
            )
        };
        match result {
            NO_ERROR => break buffer,
            ERROR_BUFFER_OVERFLOW => continue,
            code => return Err(std::io::Error::from_raw_os_error(code as i32).into()),
        }
    };

    let mut entries = Vec::new();
    let mut adapter = buffer.as_ptr() as *const IP_ADAPTER_ADDRESSES_LH;
    while !adapter.is_null() {
        let row = unsafe { &*adapter };

        let mut addrs = Vec::new();
        let mut unicast = row.FirstUnicastAddress;
        while !unicast.is_null() {
            let address = unsafe { &*unicast };
            if let Some(addr) = unsafe { sockaddr_ip(address.Address.lpSockaddr) } {
                addrs.push(addr);
            }
            unicast = address.Next;
        }

        // TransmitLinkSpeed is in bits per second, u64::MAX when unknown
        let speed_mbps = Some(row.TransmitLinkSpeed)
            .filter(|bps| *bps != u64::MAX)
            .map(|bps| bps / 1_000_000)
            .filter(|mbps| *mbps > 0);

        entries.push(InterfaceEntry {
            name: unsafe { wide_to_string(row.FriendlyName) },
            addrs,
            link: LinkStats {
                is_up: row.OperStatus == IfOperStatusUp,
                speed_mbps,
                mtu: Some(u64::from(row.Mtu)),
            },
        });
        adapter = row.Next;
    }

    Ok(entries)
}

/// `Some(true)` on AC power, `None` when Windows cannot tell
pub fn ac_line_online() -> Option<bool> {
    let mut status: SYSTEM_POWER_STATUS = unsafe { std::mem::zeroed() };
    if unsafe { GetSystemPowerStatus(&mut status) } == 0 {
        return None;
    }
    match status.ACLineStatus {
        0 => Some(false),
        1 => Some(true),
        _ => None,
    }
}

unsafe fn sockaddr_ip(addr: *const SOCKADDR) -> Option<IpAddr> {
    if addr.is_null() {
        return None;
    }
    unsafe {
        match (*addr).sa_family {
            AF_INET => {
                let sin = &*(addr as *const SOCKADDR_IN);
                Some(IpAddr::V4(Ipv4Addr::from(u32::from_be(sin.sin_addr.S_un.S_addr))))
            }
            AF_INET6 => {
                let sin6 = &*(addr as *const SOCKADDR_IN6);
                Some(IpAddr::V6(Ipv6Addr::from(sin6.sin6_addr.u.Byte)))
            }
            _ => None,
        }
    }
}

unsafe fn wide_to_string(text: *const u16) -> String {
    if text.is_null() {
        return String::new();
    }
    unsafe {
        let len = (0..).take_while(|&i| *text.add(i) != 0).count();
        String::from_utf16_lossy(std::slice::from_raw_parts(text, len))
    }
}
