//! VLESS request header decoding.
//!
//! The first message on every tunnel carries the header:
//!
//! ```text
//! +---------+------------+---------+---------+---------+------+------+---------+---------+
//! | version | identifier | opt len | options | command | port | atyp | address | payload |
//! |   1     |     16     |    1    |    N    |    1    |  2   |  1   |  var    |  rest   |
//! +---------+------------+---------+---------+---------+------+------+---------+---------+
//! ```
//!
//! Port is big-endian. Address is 4 bytes (IPv4), a length-prefixed name
//! (domain) or 16 bytes (IPv6). Everything after the address is payload the
//! client sent ahead of the acknowledgment.

use crate::cursor::ByteCursor;
use crate::error::{VlessError, VlessResult};
use crate::identity::{Identifier, IDENTIFIER_LEN};
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};

/// Address-family tag values.
pub const ATYP_IPV4: u8 = 0x01;
pub const ATYP_DOMAIN: u8 = 0x02;
pub const ATYP_IPV6: u8 = 0x03;

/// Command values.
pub const CMD_TCP: u8 = 0x01;
pub const CMD_UDP: u8 = 0x02;
pub const CMD_MUX: u8 = 0x03;

/// What the client asks the server to do with the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Tcp,
    Udp,
    Mux,
}

impl TryFrom<u8> for Command {
    type Error = VlessError;

    fn try_from(value: u8) -> VlessResult<Self> {
        match value {
            CMD_TCP => Ok(Command::Tcp),
            CMD_UDP => Ok(Command::Udp),
            CMD_MUX => Ok(Command::Mux),
            other => Err(VlessError::InvalidCommand(other)),
        }
    }
}

impl From<Command> for u8 {
    fn from(cmd: Command) -> u8 {
        match cmd {
            Command::Tcp => CMD_TCP,
            Command::Udp => CMD_UDP,
            Command::Mux => CMD_MUX,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressFamily {
    Ipv4,
    Domain,
    Ipv6,
}

impl TryFrom<u8> for AddressFamily {
    type Error = VlessError;

    fn try_from(value: u8) -> VlessResult<Self> {
        match value {
            ATYP_IPV4 => Ok(AddressFamily::Ipv4),
            ATYP_DOMAIN => Ok(AddressFamily::Domain),
            ATYP_IPV6 => Ok(AddressFamily::Ipv6),
            other => Err(VlessError::InvalidAddressType(other)),
        }
    }
}

impl From<AddressFamily> for u8 {
    fn from(family: AddressFamily) -> u8 {
        match family {
            AddressFamily::Ipv4 => ATYP_IPV4,
            AddressFamily::Domain => ATYP_DOMAIN,
            AddressFamily::Ipv6 => ATYP_IPV6,
        }
    }
}

/// Destination host as carried in the header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetAddress {
    Ipv4(Ipv4Addr),
    Domain(String),
    Ipv6(Ipv6Addr),
}

impl TargetAddress {
    pub fn family(&self) -> AddressFamily {
        match self {
            TargetAddress::Ipv4(_) => AddressFamily::Ipv4,
            TargetAddress::Domain(_) => AddressFamily::Domain,
            TargetAddress::Ipv6(_) => AddressFamily::Ipv6,
        }
    }

    /// Host string used for the outbound connect.
    ///
    /// IPv6 is rendered as eight lowercase hex groups with no `::`
    /// compression, e.g. `0:0:0:0:0:0:0:1`.
    pub fn host(&self) -> String {
        match self {
            TargetAddress::Ipv4(ip) => ip.to_string(),
            TargetAddress::Domain(name) => name.clone(),
            TargetAddress::Ipv6(ip) => ip
                .segments()
                .iter()
                .map(|seg| format!("{seg:x}"))
                .collect::<Vec<_>>()
                .join(":"),
        }
    }

    fn decode(family: AddressFamily, cur: &mut ByteCursor<'_>) -> VlessResult<Self> {
        match family {
            AddressFamily::Ipv4 => {
                let octets = cur.read_array::<4>("ipv4 address")?;
                Ok(TargetAddress::Ipv4(Ipv4Addr::from(octets)))
            }
            AddressFamily::Domain => {
                let len = cur.read_u8("domain length")? as usize;
                let raw = cur.take(len, "domain name")?;
                Ok(TargetAddress::Domain(
                    String::from_utf8_lossy(raw).into_owned(),
                ))
            }
            AddressFamily::Ipv6 => {
                let octets = cur.read_array::<16>("ipv6 address")?;
                Ok(TargetAddress::Ipv6(Ipv6Addr::from(octets)))
            }
        }
    }

    fn encode_into(&self, out: &mut Vec<u8>) -> VlessResult<()> {
        out.push(self.family().into());
        match self {
            TargetAddress::Ipv4(ip) => out.extend_from_slice(&ip.octets()),
            TargetAddress::Domain(name) => {
                let len = u8::try_from(name.len())
                    .map_err(|_| VlessError::DomainTooLong(name.len()))?;
                out.push(len);
                out.extend_from_slice(name.as_bytes());
            }
            TargetAddress::Ipv6(ip) => out.extend_from_slice(&ip.octets()),
        }
        Ok(())
    }
}

impl fmt::Display for TargetAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.host())
    }
}

/// A decoded request header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeRequest {
    /// Protocol version byte, echoed back in the acknowledgment.
    pub version: u8,
    /// Identifier claimed by the client.
    pub identifier: Identifier,
    pub command: Command,
    pub address: TargetAddress,
    pub port: u16,
    /// Offset in the original message where client payload starts.
    pub payload_offset: usize,
}

impl HandshakeRequest {
    pub fn address_family(&self) -> AddressFamily {
        self.address.family()
    }

    pub fn host(&self) -> String {
        self.address.host()
    }

    /// The bytes of `message` that follow the header.
    ///
    /// `message` must be the buffer this request was decoded from.
    pub fn payload<'a>(&self, message: &'a [u8]) -> &'a [u8] {
        message.get(self.payload_offset..).unwrap_or_default()
    }

    /// Check the claimed identifier against the configured secret.
    pub fn authenticate(&self, secret: &Identifier) -> VlessResult<()> {
        if secret.matches(&self.identifier) {
            Ok(())
        } else {
            Err(VlessError::AuthFailed)
        }
    }

    /// The acknowledgment to send once the outbound connection is up.
    pub fn acknowledgment(&self) -> [u8; 2] {
        acknowledgment(self.version)
    }
}

/// Decode the header at the start of `message`.
///
/// Pure: no I/O, and the identifier is not checked here (see
/// [`HandshakeRequest::authenticate`]).
pub fn decode(message: &[u8]) -> VlessResult<HandshakeRequest> {
    let mut cur = ByteCursor::new(message);

    let version = cur.read_u8("version")?;
    let identifier = Identifier::from_bytes(cur.read_array::<IDENTIFIER_LEN>("identifier")?);

    let options_len = cur.read_u8("options length")? as usize;
    cur.skip(options_len, "options")?;

    let command = Command::try_from(cur.read_u8("command")?)?;
    let port = cur.read_u16_be("port")?;
    let family = AddressFamily::try_from(cur.read_u8("address type")?)?;
    let address = TargetAddress::decode(family, &mut cur)?;

    Ok(HandshakeRequest {
        version,
        identifier,
        command,
        address,
        port,
        payload_offset: cur.position(),
    })
}

/// Decode and authenticate in one step.
///
/// The whole header is decoded before the identifier is compared, so a
/// malformed header and a wrong identifier cost the same amount of work up to
/// the point where either is rejected.
pub fn decode_authenticated(message: &[u8], secret: &Identifier) -> VlessResult<HandshakeRequest> {
    let request = decode(message)?;
    request.authenticate(secret)?;
    Ok(request)
}

/// Build a request header followed by `payload`. No options are written.
///
/// Fails with [`VlessError::DomainTooLong`] when a domain does not fit the
/// one-byte length prefix.
pub fn encode_request(
    version: u8,
    identifier: &Identifier,
    command: Command,
    address: &TargetAddress,
    port: u16,
    payload: &[u8],
) -> VlessResult<Vec<u8>> {
    let mut out = Vec::with_capacity(1 + IDENTIFIER_LEN + 4 + 1 + 256 + payload.len());
    out.push(version);
    out.extend_from_slice(identifier.as_bytes());
    out.push(0);
    out.push(command.into());
    out.extend_from_slice(&port.to_be_bytes());
    address.encode_into(&mut out)?;
    out.extend_from_slice(payload);
    Ok(out)
}

/// `[version, 0]`: echo the version, no response options.
pub fn acknowledgment(version: u8) -> [u8; 2] {
    [version, 0]
}
