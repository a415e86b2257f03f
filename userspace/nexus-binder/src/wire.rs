// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Transaction envelope codec (fixed little-endian layout).
//!
//! Frame shape:
//! `[N,B,ver,target_tag, owner:u32, node:u64, cookie:u64, opcode:u32,
//!   flags:u32, sender_pid:u32, sender_euid:u32, correlation:u64,
//!   payload_len:u32, object_count:u32, payload..., objects...]`
//!
//! Each object-table entry is
//! `[offset:u32, owner:u32, node:u64, delta:i8]`: the payload offset where
//! the object is referenced, the globally meaningful `(owner, node)` identity
//! and the strong-count delta transferred with it.
//!
//! OWNERS: @runtime
//! STATUS: Experimental
//! API_STABILITY: Internal
//!
//! INVARIANTS:
//!   - Never panics on malformed/truncated input
//!   - Bounded payload and object-table sizes
//!   - Handles never appear on the wire; objects travel as `(owner, node)`

use thiserror::Error;

use crate::{NodeId, Pid};

/// Frame magic (byte 0).
pub const MAGIC0: u8 = b'N';
/// Frame magic (byte 1).
pub const MAGIC1: u8 = b'B';
/// Protocol version.
pub const VERSION: u8 = 1;

/// Fixed header length in bytes.
pub const HEADER_LEN: usize = 56;
/// Encoded length of one object-table entry.
pub const OBJECT_ENTRY_LEN: usize = 17;

/// Maximum payload bytes accepted by the decoder.
pub const MAX_PAYLOAD_LEN: usize = 1 << 20;
/// Maximum object-table entries accepted by the decoder.
pub const MAX_OBJECTS: usize = 64;

/// Flag bit: the transaction expects no reply.
pub const FLAG_ONEWAY: u32 = 1 << 0;
/// Flag bit: this frame is a reply to an earlier transaction.
pub const FLAG_REPLY: u32 = 1 << 1;

const STATUS_SHIFT: u32 = 8;
const STATUS_MASK: u32 = 0xFF << STATUS_SHIFT;

/// Reply status: the handler completed and produced a payload.
pub const STATUS_OK: u8 = 0;
/// Reply status: the target object or process is unknown.
pub const STATUS_UNREACHABLE: u8 = 1;
/// Reply status: the policy hook declined the call.
pub const STATUS_REJECTED: u8 = 2;
/// Reply status: the handler faulted or the request was malformed.
pub const STATUS_FAULT: u8 = 3;

/// First opcode of the control range. User opcodes must stay below it.
pub const OP_CONTROL_BASE: u32 = 0xFFFF_FF00;
/// Control opcode: add one strong count to the target node.
pub const OP_ACQUIRE_STRONG: u32 = OP_CONTROL_BASE + 1;
/// Control opcode: drop one strong count from the target node.
pub const OP_RELEASE_STRONG: u32 = OP_CONTROL_BASE + 2;
/// Control opcode: add one weak count to the target node.
pub const OP_ACQUIRE_WEAK: u32 = OP_CONTROL_BASE + 3;
/// Control opcode: drop one weak count from the target node.
pub const OP_RELEASE_WEAK: u32 = OP_CONTROL_BASE + 4;
/// Control opcode: the named process terminated (payload: pid u32).
pub const OP_DEAD_NOTIFICATION: u32 = OP_CONTROL_BASE + 5;
/// Control opcode: a worker thread joined the receive loop.
pub const OP_ENTER_LOOP: u32 = OP_CONTROL_BASE + 6;
/// Control opcode: a worker thread left the receive loop.
pub const OP_EXIT_LOOP: u32 = OP_CONTROL_BASE + 7;

/// Returns `true` for opcodes reserved for the runtime itself.
pub const fn is_control_opcode(opcode: u32) -> bool {
    opcode >= OP_CONTROL_BASE
}

/// Errors when decoding transaction frames.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum WireError {
    /// Buffer is too short for the expected structure.
    #[error("frame truncated")]
    Truncated,
    /// Magic bytes were incorrect.
    #[error("bad frame magic")]
    BadMagic,
    /// Unsupported protocol version.
    #[error("unsupported frame version")]
    BadVersion,
    /// Unknown target tag byte.
    #[error("unknown target tag")]
    BadTarget,
    /// Declared payload or object-table size exceeds the caps.
    #[error("frame exceeds size caps")]
    TooLarge,
}

/// Addressee of a transaction, tagged.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WireTarget {
    /// An object resolved within the receiving process.
    Node(NodeId),
    /// An object named by its globally meaningful identity.
    Object {
        /// Process that owns the node.
        owner: Pid,
        /// Node id within the owning process.
        node: NodeId,
    },
}

const TARGET_TAG_NODE: u8 = 0;
const TARGET_TAG_OBJECT: u8 = 1;

/// One transferred object reference in the object table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WireObjectEntry {
    /// Offset into the payload where the object is referenced.
    pub offset: u32,
    /// Process that owns the node.
    pub owner: Pid,
    /// Node id within the owning process.
    pub node: NodeId,
    /// Strong-count delta transferred with the reference (0 = weak only).
    pub delta: i8,
}

/// A decoded transaction frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Envelope {
    /// Addressee of the frame.
    pub target: WireTarget,
    /// Opaque owner-supplied value, echoed in replies.
    pub cookie: u64,
    /// Operation code; replies repeat the request opcode.
    pub opcode: u32,
    /// Flag bits plus the reply status byte (bits 8..=15).
    pub flags: u32,
    /// Process that built the frame.
    pub sender_pid: Pid,
    /// Effective user id of the sender.
    pub sender_euid: u32,
    /// Matches a reply to its outstanding transaction.
    pub correlation: u64,
    /// Opaque payload bytes.
    pub payload: Vec<u8>,
    /// Object references transferred alongside the payload.
    pub objects: Vec<WireObjectEntry>,
}

impl Envelope {
    /// Returns `true` when the frame expects no reply.
    pub const fn is_oneway(&self) -> bool {
        self.flags & FLAG_ONEWAY != 0
    }

    /// Returns `true` when the frame is a reply.
    pub const fn is_reply(&self) -> bool {
        self.flags & FLAG_REPLY != 0
    }

    /// Reply status carried in the flags word.
    pub const fn status(&self) -> u8 {
        ((self.flags & STATUS_MASK) >> STATUS_SHIFT) as u8
    }

    /// Folds `status` into a flags word.
    pub const fn flags_with_status(flags: u32, status: u8) -> u32 {
        (flags & !STATUS_MASK) | ((status as u32) << STATUS_SHIFT)
    }

    /// Encodes the envelope into a fresh frame buffer.
    pub fn encode(&self) -> Vec<u8> {
        let mut out =
            Vec::with_capacity(HEADER_LEN + self.payload.len() + self.objects.len() * OBJECT_ENTRY_LEN);
        let (tag, owner, node) = match self.target {
            WireTarget::Node(node) => (TARGET_TAG_NODE, 0u32, node.value()),
            WireTarget::Object { owner, node } => (TARGET_TAG_OBJECT, owner.value(), node.value()),
        };
        out.extend_from_slice(&[MAGIC0, MAGIC1, VERSION, tag]);
        out.extend_from_slice(&owner.to_le_bytes());
        out.extend_from_slice(&node.to_le_bytes());
        out.extend_from_slice(&self.cookie.to_le_bytes());
        out.extend_from_slice(&self.opcode.to_le_bytes());
        out.extend_from_slice(&self.flags.to_le_bytes());
        out.extend_from_slice(&self.sender_pid.value().to_le_bytes());
        out.extend_from_slice(&self.sender_euid.to_le_bytes());
        out.extend_from_slice(&self.correlation.to_le_bytes());
        out.extend_from_slice(&(self.payload.len() as u32).to_le_bytes());
        out.extend_from_slice(&(self.objects.len() as u32).to_le_bytes());
        out.extend_from_slice(&self.payload);
        for entry in &self.objects {
            out.extend_from_slice(&entry.offset.to_le_bytes());
            out.extend_from_slice(&entry.owner.value().to_le_bytes());
            out.extend_from_slice(&entry.node.value().to_le_bytes());
            out.push(entry.delta as u8);
        }
        out
    }

    /// Decodes a frame buffer into an envelope.
    pub fn decode(buf: &[u8]) -> Result<Self, WireError> {
        if buf.len() < HEADER_LEN {
            return Err(WireError::Truncated);
        }
        if buf[0] != MAGIC0 || buf[1] != MAGIC1 {
            return Err(WireError::BadMagic);
        }
        if buf[2] != VERSION {
            return Err(WireError::BadVersion);
        }
        let owner = read_u32(buf, 4);
        let node = NodeId::new(read_u64(buf, 8));
        let target = match buf[3] {
            TARGET_TAG_NODE => WireTarget::Node(node),
            TARGET_TAG_OBJECT => WireTarget::Object { owner: Pid::new(owner), node },
            _ => return Err(WireError::BadTarget),
        };
        let cookie = read_u64(buf, 16);
        let opcode = read_u32(buf, 24);
        let flags = read_u32(buf, 28);
        let sender_pid = Pid::new(read_u32(buf, 32));
        let sender_euid = read_u32(buf, 36);
        let correlation = read_u64(buf, 40);
        let payload_len = read_u32(buf, 48) as usize;
        let object_count = read_u32(buf, 52) as usize;
        if payload_len > MAX_PAYLOAD_LEN || object_count > MAX_OBJECTS {
            return Err(WireError::TooLarge);
        }
        let objects_at = HEADER_LEN + payload_len;
        let total = objects_at + object_count * OBJECT_ENTRY_LEN;
        if buf.len() < total {
            return Err(WireError::Truncated);
        }
        let payload = buf[HEADER_LEN..objects_at].to_vec();
        let mut objects = Vec::with_capacity(object_count);
        for i in 0..object_count {
            let at = objects_at + i * OBJECT_ENTRY_LEN;
            objects.push(WireObjectEntry {
                offset: read_u32(buf, at),
                owner: Pid::new(read_u32(buf, at + 4)),
                node: NodeId::new(read_u64(buf, at + 8)),
                delta: buf[at + 16] as i8,
            });
        }
        Ok(Self {
            target,
            cookie,
            opcode,
            flags,
            sender_pid,
            sender_euid,
            correlation,
            payload,
            objects,
        })
    }
}

fn read_u32(buf: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]])
}

fn read_u64(buf: &[u8], at: usize) -> u64 {
    u64::from_le_bytes([
        buf[at],
        buf[at + 1],
        buf[at + 2],
        buf[at + 3],
        buf[at + 4],
        buf[at + 5],
        buf[at + 6],
        buf[at + 7],
    ])
}
