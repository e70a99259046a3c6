//! Name-based (NDN) next-hop resolution.
//!
//! Interests are forwarded along the FIB towards producers of a name
//! prefix; Data packets follow the pending-interest table back to the
//! consumer. All NDN faces share one relay interface.
//!
//! # TLV Format
//!
//! ```text
//! [type: var-number][length: var-number][value: length bytes]
//! ```
//!
//! A var-number is one byte below 253; 253, 254 and 255 announce a 2, 4
//! or 8 byte big-endian value. The outer length of a first fragment covers
//! the whole datagram, so it is not checked against the bytes present.

use log::{debug, warn};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::dispatch::{ForwardingHeader, NextHop, NextHopResolver, RouteError};
use crate::vrb::{InterfaceId, LinkAddress};

/// Interest packet type.
pub const TLV_INTEREST: u64 = 0x05;
/// Data packet type.
pub const TLV_DATA: u64 = 0x06;
/// Name TLV type.
pub const TLV_NAME: u64 = 0x07;
/// Generic name component TLV type.
pub const TLV_NAME_COMPONENT: u64 = 0x08;

/// Upper bound on parsed name components.
pub const MAX_NAME_COMPONENTS: usize = 16;

/// Read a var-number, returning it and the number of bytes consumed.
pub fn read_var_number(buf: &[u8]) -> Option<(u64, usize)> {
    let first = *buf.first()?;
    let width = match first {
        0..=252 => return Some((u64::from(first), 1)),
        253 => 2,
        254 => 4,
        255 => 8,
    };
    let bytes = buf.get(1..1 + width)?;
    let value = bytes.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b));
    Some((value, 1 + width))
}

/// Read a TLV header, returning (type, length, header size).
fn read_tlv_header(buf: &[u8]) -> Option<(u64, usize, usize)> {
    let (typ, n1) = read_var_number(buf)?;
    let (len, n2) = read_var_number(&buf[n1..])?;
    let len = usize::try_from(len).ok()?;
    Some((typ, len, n1 + n2))
}

/// An NDN name: a sequence of opaque components.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct NdnName {
    components: Vec<Vec<u8>>,
}

impl NdnName {
    pub fn new(components: Vec<Vec<u8>>) -> Self {
        Self { components }
    }

    /// Parse a `/a/b/c` style name; empty segments are ignored.
    pub fn from_uri(uri: &str) -> Self {
        Self::new(
            uri.split('/')
                .filter(|c| !c.is_empty())
                .map(|c| c.as_bytes().to_vec())
                .collect(),
        )
    }

    pub fn components(&self) -> &[Vec<u8>] {
        &self.components
    }

    /// Whether every component of `self` leads `other`.
    pub fn is_prefix_of(&self, other: &NdnName) -> bool {
        self.components.len() <= other.components.len()
            && self
                .components
                .iter()
                .zip(&other.components)
                .all(|(a, b)| a == b)
    }

    /// Encode as a Name TLV.
    pub fn to_tlv(&self) -> Vec<u8> {
        let mut value = Vec::new();
        for comp in &self.components {
            write_tlv(&mut value, TLV_NAME_COMPONENT, comp);
        }
        let mut out = Vec::with_capacity(value.len() + 4);
        write_tlv(&mut out, TLV_NAME, &value);
        out
    }
}

impl std::fmt::Display for NdnName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.components.is_empty() {
            return write!(f, "/");
        }
        for comp in &self.components {
            write!(f, "/{}", String::from_utf8_lossy(comp))?;
        }
        Ok(())
    }
}

fn write_var_number(out: &mut Vec<u8>, value: u64) {
    match value {
        0..=252 => out.push(value as u8),
        253..=0xffff => {
            out.push(253);
            out.extend_from_slice(&(value as u16).to_be_bytes());
        }
        0x1_0000..=0xffff_ffff => {
            out.push(254);
            out.extend_from_slice(&(value as u32).to_be_bytes());
        }
        _ => {
            out.push(255);
            out.extend_from_slice(&value.to_be_bytes());
        }
    }
}

/// Append one TLV element to `out`.
pub fn write_tlv(out: &mut Vec<u8>, typ: u64, value: &[u8]) {
    write_var_number(out, typ);
    write_var_number(out, value.len() as u64);
    out.extend_from_slice(value);
}

/// Kind of NDN packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NdnPacketType {
    Interest,
    Data,
    Other(u64),
}

impl From<u64> for NdnPacketType {
    fn from(typ: u64) -> Self {
        match typ {
            TLV_INTEREST => Self::Interest,
            TLV_DATA => Self::Data,
            other => Self::Other(other),
        }
    }
}

/// Find the packet type and name in the first bytes of an NDN packet.
pub fn parse_packet(data: &[u8]) -> Result<(NdnPacketType, NdnName), RouteError> {
    let (packet_type, _, mut pos) =
        read_tlv_header(data).ok_or(RouteError::MalformedHeader("unable to read NDN packet header"))?;
    if pos >= data.len() {
        return Err(RouteError::MalformedHeader("NDN packet has no body"));
    }

    while let Some((typ, len, hdr)) = read_tlv_header(&data[pos..]) {
        let start = pos + hdr;
        let end = start
            .checked_add(len)
            .ok_or(RouteError::MalformedHeader("NDN field length overflow"))?;
        if typ == TLV_NAME {
            let value = data
                .get(start..end)
                .ok_or(RouteError::MalformedHeader("NDN name exceeds fragment"))?;
            return Ok((packet_type.into(), parse_name(value)?));
        }
        if end >= data.len() {
            break;
        }
        pos = end;
    }
    debug!("vrb: no NDN name found in packet");
    Err(RouteError::MalformedHeader("no NDN name in packet"))
}

fn parse_name(mut value: &[u8]) -> Result<NdnName, RouteError> {
    let mut components = Vec::new();
    while !value.is_empty() {
        let (typ, len, hdr) =
            read_tlv_header(value).ok_or(RouteError::MalformedHeader("unable to parse NDN name"))?;
        let comp = hdr
            .checked_add(len)
            .and_then(|end| value.get(hdr..end))
            .ok_or(RouteError::MalformedHeader("NDN name component exceeds name"))?;
        // unknown component types are skipped
        if typ == TLV_NAME_COMPONENT && components.len() < MAX_NAME_COMPONENTS {
            components.push(comp.to_vec());
        }
        value = &value[hdr + comp.len()..];
    }
    Ok(NdnName::new(components))
}

#[derive(Debug, Clone)]
struct FibEntry {
    prefix: NdnName,
    face: LinkAddress,
}

#[derive(Debug, Clone)]
struct PitEntry {
    name: NdnName,
    faces: Vec<LinkAddress>,
}

#[derive(Debug, Default)]
struct NdnTables {
    fib: Vec<FibEntry>,
    pit: Vec<PitEntry>,
}

/// NDN resolver with its own FIB and PIT.
#[derive(Debug)]
pub struct NdnResolver {
    relay_interface: InterfaceId,
    tables: RwLock<NdnTables>,
}

impl NdnResolver {
    /// Create a resolver whose faces all live on `relay_interface`.
    pub fn new(relay_interface: InterfaceId) -> Self {
        Self {
            relay_interface,
            tables: RwLock::new(NdnTables::default()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, NdnTables> {
        match self.tables.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("NDN tables lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, NdnTables> {
        match self.tables.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("NDN tables lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    /// Forward Interests under `prefix` to `face`.
    pub fn add_route(&self, prefix: NdnName, face: LinkAddress) {
        self.write().fib.push(FibEntry { prefix, face });
    }

    /// Record that `face` is waiting for Data named `name`.
    pub fn add_pending(&self, name: NdnName, face: LinkAddress) {
        let mut tables = self.write();
        if let Some(entry) = tables.pit.iter_mut().find(|e| e.name == name) {
            if !entry.faces.contains(&face) {
                entry.faces.push(face);
            }
            return;
        }
        tables.pit.push(PitEntry {
            name,
            faces: vec![face],
        });
    }

    /// Drop the pending interest for `name`.
    pub fn satisfy(&self, name: &NdnName) -> bool {
        let mut tables = self.write();
        let before = tables.pit.len();
        tables.pit.retain(|e| e.name != *name);
        tables.pit.len() != before
    }

    fn route_interest(&self, name: &NdnName) -> Option<LinkAddress> {
        let tables = self.read();
        let entry = tables.fib.iter().find(|e| e.prefix.is_prefix_of(name))?;
        debug!("vrb: FIB entry for prefix {} found", name);
        Some(entry.face)
    }

    fn route_data(&self, name: &NdnName) -> Option<LinkAddress> {
        let tables = self.read();
        let entry = tables.pit.iter().find(|e| e.name == *name)?;
        debug!("vrb: PIT entry for prefix {} found", name);
        entry.faces.first().copied()
    }
}

impl NextHopResolver for NdnResolver {
    fn resolve(
        &self,
        header: &ForwardingHeader,
        _in_interface: InterfaceId,
    ) -> Result<NextHop, RouteError> {
        let (packet_type, name) = parse_packet(&header.data)?;
        debug!("vrb: found prefix {} in packet", name);
        let face = match packet_type {
            NdnPacketType::Interest => self.route_interest(&name),
            NdnPacketType::Data => self.route_data(&name),
            NdnPacketType::Other(typ) => {
                debug!("vrb: do not know how to forward NDN packet type {}", typ);
                None
            }
        };
        face.map(|address| NextHop::new(self.relay_interface, address))
            .ok_or(RouteError::NoRoute)
    }
}
