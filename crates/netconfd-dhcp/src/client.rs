//! One-shot DISCOVER/OFFER/REQUEST/ACK exchange.

use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;

use async_trait::async_trait;
use dhcproto::v4::{DhcpOption, Flags, Message, MessageType, Opcode, OptionCode};
use dhcproto::{Decodable, Encodable};
use tokio::net::UdpSocket;
use tracing::{debug, trace};

use crate::error::{Result, TransportError};
use crate::lease::LeaseSnapshot;

const SERVER_PORT: u16 = 67;
const CLIENT_PORT: u16 = 68;
const MAX_DHCP_PACKET: usize = 1500;

/// Performs one full DHCPv4 exchange on a named interface within a deadline.
#[async_trait]
pub trait LeaseTransport: Send + Sync {
    /// Run DISCOVER/OFFER/REQUEST/ACK on `iface`, returning the ACK's lease
    /// fields. The deadline bounds the entire exchange; the socket is closed
    /// before the call returns. Partial exchanges are errors.
    async fn request_lease(&self, iface: &str, deadline: Duration) -> Result<LeaseSnapshot>;
}

/// Production transport over a broadcast UDP socket bound to the interface.
///
/// Every call is a fresh full exchange with a fresh transaction id; renewal
/// is re-acquisition, there is no unicast-renew path.
pub struct DoraClient;

#[async_trait]
impl LeaseTransport for DoraClient {
    async fn request_lease(&self, iface: &str, deadline: Duration) -> Result<LeaseSnapshot> {
        let mac = interface_mac(iface)?;
        match tokio::time::timeout(deadline, run_exchange(iface, mac)).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout(deadline)),
        }
    }
}

async fn run_exchange(iface: &str, mac: [u8; 6]) -> Result<LeaseSnapshot> {
    let socket = open_socket(iface)?;
    let broadcast = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::BROADCAST, SERVER_PORT));
    let xid: u32 = rand::random();

    let discover = build_discover(xid, mac)?;
    socket.send_to(&discover, broadcast).await?;
    debug!(interface = %iface, xid, "sent DISCOVER");

    let offer = recv_reply(&socket, xid, MessageType::Offer).await?;
    let offered_ip = offer.yiaddr();
    if offered_ip.is_unspecified() {
        return Err(TransportError::ProtocolViolation(
            "OFFER carried no address".to_string(),
        ));
    }
    let server_id = LeaseSnapshot::from_ack(&offer).server_id;
    debug!(interface = %iface, xid, ip = %offered_ip, "received OFFER");

    let request = build_request(xid, mac, offered_ip, server_id)?;
    socket.send_to(&request, broadcast).await?;
    debug!(interface = %iface, xid, ip = %offered_ip, "sent REQUEST");

    let ack = recv_reply(&socket, xid, MessageType::Ack).await?;
    debug!(interface = %iface, xid, ip = %ack.yiaddr(), "received ACK");

    Ok(LeaseSnapshot::from_ack(&ack))
}

/// Bind a broadcast-capable UDP socket to the client port on one device.
fn open_socket(iface: &str) -> Result<UdpSocket> {
    let socket = socket2::Socket::new(
        socket2::Domain::IPV4,
        socket2::Type::DGRAM,
        Some(socket2::Protocol::UDP),
    )?;

    socket.set_reuse_address(true).ok();
    socket.set_broadcast(true)?;
    socket.bind_device(Some(iface.as_bytes()))?;

    let bind_addr = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, CLIENT_PORT);
    socket.bind(&SocketAddr::V4(bind_addr).into())?;
    socket.set_nonblocking(true)?;

    let std_socket: std::net::UdpSocket = socket.into();
    Ok(UdpSocket::from_std(std_socket)?)
}

/// Wait for a BOOTREPLY of the wanted type carrying our transaction id.
/// Unrelated traffic is skipped; a NAK aborts the exchange.
async fn recv_reply(socket: &UdpSocket, xid: u32, wanted: MessageType) -> Result<Message> {
    let mut buf = [0u8; MAX_DHCP_PACKET];
    loop {
        let (len, src) = socket.recv_from(&mut buf).await?;
        let msg = match Message::from_bytes(&buf[..len]) {
            Ok(msg) => msg,
            Err(err) => {
                trace!(%src, error = %err, "ignoring undecodable packet");
                continue;
            }
        };

        if msg.xid() != xid || msg.opcode() != Opcode::BootReply {
            trace!(%src, xid = msg.xid(), "ignoring unrelated packet");
            continue;
        }

        let msg_type = msg.opts().get(OptionCode::MessageType).and_then(|opt| {
            if let DhcpOption::MessageType(mt) = opt {
                Some(*mt)
            } else {
                None
            }
        });

        match msg_type {
            Some(mt) if mt == wanted => return Ok(msg),
            Some(MessageType::Nak) => {
                return Err(TransportError::ProtocolViolation(
                    "server answered with NAK".to_string(),
                ));
            }
            Some(other) => {
                trace!(%src, msg_type = ?other, "ignoring unexpected message type");
            }
            None => {
                return Err(TransportError::ProtocolViolation(
                    "reply without message type".to_string(),
                ));
            }
        }
    }
}

fn build_discover(xid: u32, mac: [u8; 6]) -> Result<Vec<u8>> {
    let mut msg = base_request(xid, mac);
    msg.opts_mut()
        .insert(DhcpOption::MessageType(MessageType::Discover));
    encode(&msg)
}

fn build_request(
    xid: u32,
    mac: [u8; 6],
    requested_ip: Ipv4Addr,
    server_id: Option<Ipv4Addr>,
) -> Result<Vec<u8>> {
    let mut msg = base_request(xid, mac);
    msg.opts_mut()
        .insert(DhcpOption::MessageType(MessageType::Request));
    msg.opts_mut()
        .insert(DhcpOption::RequestedIpAddress(requested_ip));
    if let Some(sid) = server_id {
        msg.opts_mut().insert(DhcpOption::ServerIdentifier(sid));
    }
    encode(&msg)
}

fn base_request(xid: u32, mac: [u8; 6]) -> Message {
    let mut msg = Message::default();
    msg.set_opcode(Opcode::BootRequest);
    msg.set_xid(xid);
    // Ask servers to broadcast replies; there is no address to receive
    // unicast on yet.
    msg.set_flags(Flags::default().set_broadcast());
    msg.set_chaddr(&mac);

    msg.opts_mut().insert(DhcpOption::ParameterRequestList(vec![
        OptionCode::SubnetMask,
        OptionCode::Router,
        OptionCode::DomainNameServer,
        OptionCode::AddressLeaseTime,
        OptionCode::Renewal,
    ]));
    msg
}

fn encode(msg: &Message) -> Result<Vec<u8>> {
    msg.to_vec()
        .map_err(|err| TransportError::ProtocolViolation(err.to_string()))
}

/// Resolve the interface's hardware address from sysfs.
fn interface_mac(iface: &str) -> Result<[u8; 6]> {
    let path = format!("/sys/class/net/{}/address", iface);
    let text = std::fs::read_to_string(&path).map_err(|source| {
        TransportError::InterfaceUnavailable {
            name: iface.to_string(),
            source,
        }
    })?;
    parse_mac(text.trim()).ok_or_else(|| TransportError::InterfaceUnavailable {
        name: iface.to_string(),
        source: io::Error::new(
            io::ErrorKind::InvalidData,
            format!("malformed hardware address: {}", text.trim()),
        ),
    })
}

fn parse_mac(text: &str) -> Option<[u8; 6]> {
    let mut mac = [0u8; 6];
    let mut parts = text.split(':');
    for byte in mac.iter_mut() {
        *byte = u8::from_str_radix(parts.next()?, 16).ok()?;
    }
    if parts.next().is_some() {
        return None;
    }
    Some(mac)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAC: [u8; 6] = [0x00, 0x11, 0x22, 0x33, 0x44, 0x55];

    #[test]
    fn test_parse_mac() {
        assert_eq!(parse_mac("00:11:22:33:44:55"), Some(MAC));
        assert_eq!(parse_mac("aa:bb:cc:dd:ee:ff"), Some([0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]));
        assert_eq!(parse_mac(""), None);
        assert_eq!(parse_mac("00:11:22:33:44"), None);
        assert_eq!(parse_mac("00:11:22:33:44:55:66"), None);
        assert_eq!(parse_mac("zz:11:22:33:44:55"), None);
    }

    #[test]
    fn test_discover_shape() {
        let bytes = build_discover(0xdeadbeef, MAC).unwrap();
        let msg = Message::from_bytes(&bytes).unwrap();

        assert_eq!(msg.opcode(), Opcode::BootRequest);
        assert_eq!(msg.xid(), 0xdeadbeef);
        assert!(msg.flags().broadcast());
        assert_eq!(&msg.chaddr()[..6], &MAC);
        assert_eq!(
            msg.opts().get(OptionCode::MessageType),
            Some(&DhcpOption::MessageType(MessageType::Discover))
        );
        assert!(msg.opts().get(OptionCode::ParameterRequestList).is_some());
    }

    #[test]
    fn test_request_carries_offer_fields() {
        let ip = Ipv4Addr::new(192, 168, 1, 100);
        let sid = Ipv4Addr::new(192, 168, 1, 2);
        let bytes = build_request(7, MAC, ip, Some(sid)).unwrap();
        let msg = Message::from_bytes(&bytes).unwrap();

        assert_eq!(
            msg.opts().get(OptionCode::MessageType),
            Some(&DhcpOption::MessageType(MessageType::Request))
        );
        assert_eq!(
            msg.opts().get(OptionCode::RequestedIpAddress),
            Some(&DhcpOption::RequestedIpAddress(ip))
        );
        assert_eq!(
            msg.opts().get(OptionCode::ServerIdentifier),
            Some(&DhcpOption::ServerIdentifier(sid))
        );
    }

    #[test]
    fn test_request_without_server_id() {
        let ip = Ipv4Addr::new(192, 168, 1, 100);
        let bytes = build_request(7, MAC, ip, None).unwrap();
        let msg = Message::from_bytes(&bytes).unwrap();
        assert!(msg.opts().get(OptionCode::ServerIdentifier).is_none());
    }
}
