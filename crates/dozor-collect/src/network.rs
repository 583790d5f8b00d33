//! Listening-port audit and connection-state summary (§4.2.4), parsed from
//! `/proc/net/{tcp,tcp6,udp,udp6}`.

use std::collections::HashMap;
use std::net::Ipv4Addr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnState {
    Established,
    SynSent,
    SynRecv,
    FinWait1,
    FinWait2,
    TimeWait,
    Close,
    CloseWait,
    LastAck,
    Listen,
    Closing,
    Unknown,
}

impl ConnState {
    fn from_hex(code: &str) -> Self {
        match code.to_uppercase().as_str() {
            "01" => Self::Established,
            "02" => Self::SynSent,
            "03" => Self::SynRecv,
            "04" => Self::FinWait1,
            "05" => Self::FinWait2,
            "06" => Self::TimeWait,
            "07" => Self::Close,
            "08" => Self::CloseWait,
            "09" => Self::LastAck,
            "0A" => Self::Listen,
            "0B" => Self::Closing,
            _ => Self::Unknown,
        }
    }
}

impl std::fmt::Display for ConnState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Established => "ESTABLISHED",
            Self::SynSent => "SYN-SENT",
            Self::SynRecv => "SYN-RECV",
            Self::FinWait1 => "FIN-WAIT-1",
            Self::FinWait2 => "FIN-WAIT-2",
            Self::TimeWait => "TIME-WAIT",
            Self::Close => "CLOSE",
            Self::CloseWait => "CLOSE-WAIT",
            Self::LastAck => "LAST-ACK",
            Self::Listen => "LISTEN",
            Self::Closing => "CLOSING",
            Self::Unknown => "UNKNOWN",
        };
        write!(f, "{s}")
    }
}

struct Entry {
    local_addr: Ipv4Addr,
    local_port: u16,
    remote_addr: Ipv4Addr,
    state: ConnState,
}

/// `/proc/net/tcp` packs the address as 4 little-endian bytes in hex.
fn parse_hex_ipv4(hex: &str) -> Option<Ipv4Addr> {
    if hex.len() != 8 {
        return None;
    }
    let bytes: Vec<u8> = (0..4).map(|i| u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16).unwrap_or(0)).collect();
    Some(Ipv4Addr::new(bytes[3], bytes[2], bytes[1], bytes[0]))
}

fn parse_proc_net_line(line: &str) -> Option<Entry> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 4 {
        return None;
    }
    let (local_hex, local_port_hex) = fields[1].split_once(':')?;
    let (remote_hex, _remote_port_hex) = fields[2].split_once(':')?;
    Some(Entry {
        local_addr: parse_hex_ipv4(local_hex)?,
        local_port: u16::from_str_radix(local_port_hex, 16).ok()?,
        remote_addr: parse_hex_ipv4(remote_hex)?,
        state: ConnState::from_hex(fields[3]),
    })
}

fn parse_proc_net(content: &str) -> Vec<Entry> {
    content.lines().skip(1).filter_map(parse_proc_net_line).collect()
}

#[derive(Debug, Clone)]
pub struct PortFinding {
    pub port: u16,
    pub protocol: &'static str,
    pub bound_all_interfaces: bool,
}

/// Enumerates listening sockets, flagging any bound to `0.0.0.0` rather
/// than loopback (§4.2.4).
pub async fn audit_ports() -> Vec<PortFinding> {
    let mut findings = Vec::new();
    if let Ok(tcp) = tokio::fs::read_to_string("/proc/net/tcp").await {
        for entry in parse_proc_net(&tcp).into_iter().filter(|e| e.state == ConnState::Listen) {
            findings.push(PortFinding {
                port: entry.local_port,
                protocol: "tcp",
                bound_all_interfaces: !entry.local_addr.is_loopback(),
            });
        }
    }
    if let Ok(udp) = tokio::fs::read_to_string("/proc/net/udp").await {
        for entry in parse_proc_net(&udp) {
            findings.push(PortFinding {
                port: entry.local_port,
                protocol: "udp",
                bound_all_interfaces: !entry.local_addr.is_loopback(),
            });
        }
    }
    findings
}

#[derive(Debug, Clone, Default)]
pub struct ConnectionsSummary {
    pub tcp_state_counts: HashMap<String, usize>,
    pub udp_listener_count: usize,
    pub top_remote_ips: Vec<(String, usize)>,
    pub established_per_port: HashMap<u16, usize>,
    pub warnings: Vec<String>,
}

/// Thresholds named in §4.2.4: CLOSE-WAIT > 50, TIME-WAIT > 500, per-IP > 100.
pub struct ConnectionThresholds {
    pub close_wait: usize,
    pub time_wait: usize,
    pub per_ip: usize,
}

impl Default for ConnectionThresholds {
    fn default() -> Self {
        Self { close_wait: 50, time_wait: 500, per_ip: 100 }
    }
}

pub async fn summarize_connections(top_n: usize, thresholds: &ConnectionThresholds) -> ConnectionsSummary {
    let mut summary = ConnectionsSummary::default();
    let mut remote_counts: HashMap<String, usize> = HashMap::new();

    if let Ok(tcp) = tokio::fs::read_to_string("/proc/net/tcp").await {
        for entry in parse_proc_net(&tcp) {
            *summary.tcp_state_counts.entry(entry.state.to_string()).or_insert(0) += 1;
            if entry.state == ConnState::Established {
                *summary.established_per_port.entry(entry.local_port).or_insert(0) += 1;
                *remote_counts.entry(entry.remote_addr.to_string()).or_insert(0) += 1;
            }
        }
    }
    if let Ok(udp) = tokio::fs::read_to_string("/proc/net/udp").await {
        summary.udp_listener_count = parse_proc_net(&udp).len();
    }

    let mut ranked: Vec<(String, usize)> = remote_counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    ranked.truncate(top_n);
    summary.top_remote_ips = ranked.clone();

    let close_wait = summary.tcp_state_counts.get("CLOSE-WAIT").copied().unwrap_or(0);
    if close_wait > thresholds.close_wait {
        summary.warnings.push(format!("CLOSE-WAIT count {close_wait} exceeds threshold {}", thresholds.close_wait));
    }
    let time_wait = summary.tcp_state_counts.get("TIME-WAIT").copied().unwrap_or(0);
    if time_wait > thresholds.time_wait {
        summary.warnings.push(format!("TIME-WAIT count {time_wait} exceeds threshold {}", thresholds.time_wait));
    }
    for (ip, count) in &ranked {
        if *count > thresholds.per_ip {
            summary.warnings.push(format!("remote {ip} has {count} connections, exceeds threshold {}", thresholds.per_ip));
        }
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hex_ipv4_little_endian() {
        // 127.0.0.1 encoded little-endian is 0100007F
        assert_eq!(parse_hex_ipv4("0100007F"), Some(Ipv4Addr::new(127, 0, 0, 1)));
    }

    #[test]
    fn parses_proc_net_tcp_line() {
        let sample = "  sl  local_address rem_address   st\n   0: 0100007F:1F90 00000000:0000 0A\n";
        let entries = parse_proc_net(sample);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].local_port, 0x1F90);
        assert_eq!(entries[0].state, ConnState::Listen);
        assert!(entries[0].local_addr.is_loopback());
    }

    #[test]
    fn threshold_warnings_fire_when_exceeded() {
        let mut summary = ConnectionsSummary::default();
        summary.tcp_state_counts.insert("CLOSE-WAIT".to_string(), 51);
        let thresholds = ConnectionThresholds::default();
        let close_wait = summary.tcp_state_counts.get("CLOSE-WAIT").copied().unwrap_or(0);
        assert!(close_wait > thresholds.close_wait);
    }
}
