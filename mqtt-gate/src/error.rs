/*
 * Copyright Bret Ambrose. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

/*!
A module containing the core crate error enumeration, context structures, and conversion
definitions.
 */

use crate::mqtt::{ConnectReturnCode, PacketType};

use std::error::Error;
use std::fmt;

/// Additional details about a MalformedHeader error variant
#[derive(Debug)]
pub struct MalformedHeaderContext {
    source: Box<dyn Error + Send + Sync + 'static>
}

/// Additional details about a MalformedVariableHeader error variant
#[derive(Debug)]
pub struct MalformedVariableHeaderContext {

    /// type of packet whose variable header or payload could not be decoded
    pub packet_type: PacketType,

    source: Box<dyn Error + Send + Sync + 'static>
}

/// Additional details about an UnsupportedProtocolVersion error variant
#[derive(Debug)]
pub struct UnsupportedProtocolVersionContext {

    /// protocol level byte found in the Connect packet
    pub protocol_version: u8,
}

/// Additional details about an IdentifierRejected error variant
#[derive(Debug)]
pub struct IdentifierRejectedContext {
    source: Box<dyn Error + Send + Sync + 'static>
}

/// Additional details about a Timeout error variant
#[derive(Debug)]
pub struct TimeoutContext {
}

/// Additional details about a TransportClosed error variant
#[derive(Debug)]
pub struct TransportClosedContext {
    source: Box<dyn Error + Send + Sync + 'static>
}

/// Additional details about an InvalidWaitTarget error variant
#[derive(Debug)]
pub struct InvalidWaitTargetContext {

    /// type of packet that was submitted to the ack queue
    pub packet_type: PacketType,
}

/// Additional details about a DuplicatePacketId error variant
#[derive(Debug)]
pub struct DuplicatePacketIdContext {

    /// packet id that collided with an in-flight entry
    pub packet_id: u16,
}

/// Additional details about a PacketValidation error variant
#[derive(Debug)]
pub struct PacketValidationContext {

    /// type of packet that failed validation
    pub packet_type: PacketType,

    source: Box<dyn Error + Send + Sync + 'static>
}

/// Additional details about an EncodingFailure error variant
#[derive(Debug)]
pub struct EncodingFailureContext {
    source: Box<dyn Error + Send + Sync + 'static>
}

/// Additional details about a SessionFailure error variant
#[derive(Debug)]
pub struct SessionFailureContext {
    source: Box<dyn Error + Send + Sync + 'static>
}

/// Additional details about a StdIoError error variant
#[derive(Debug)]
pub struct StdIoErrorContext {
    source: Box<dyn Error + Send + Sync + 'static>
}

/// Additional details about a TlsError error variant
#[derive(Debug)]
pub struct TlsErrorContext {
    source: Box<dyn Error + Send + Sync + 'static>
}

/// Additional details about an OtherError error variant
#[derive(Debug)]
pub struct OtherErrorContext {
    source: Box<dyn Error + Send + Sync + 'static>
}

/// Basic error type for the entire mqtt-gate crate.
#[derive(Debug)]
#[non_exhaustive]
pub enum GateError {

    /// The fixed header of an incoming packet is invalid: unknown packet type, bad flag bits,
    /// an invalid publish QoS, a malformed remaining length, or a remaining length that exceeds
    /// the bytes actually available.
    MalformedHeader(MalformedHeaderContext),

    /// A variable header or payload field of an incoming packet violates the protocol.
    MalformedVariableHeader(MalformedVariableHeaderContext),

    /// A Connect packet named a protocol name/level pair that the gateway does not speak.
    UnsupportedProtocolVersion(UnsupportedProtocolVersionContext),

    /// A Connect packet carried an unacceptable client id, or the authenticator rejected
    /// the supplied credentials.
    IdentifierRejected(IdentifierRejectedContext),

    /// A read deadline expired.  During steady state this is the keepalive-violation signal
    /// rather than a failure.
    Timeout(TimeoutContext),

    /// The peer closed the transport, or it was closed locally.
    TransportClosed(TransportClosedContext),

    /// A packet was submitted to an ack queue that has nothing to wait for (QoS 0 publish,
    /// ack packets, etc...).
    InvalidWaitTarget(InvalidWaitTargetContext),

    /// A packet id collided with an in-flight ack queue entry and was not a duplicate
    /// publish re-delivery.
    DuplicatePacketId(DuplicatePacketIdContext),

    /// An outbound packet violates a protocol rule and was not encoded.
    PacketValidation(PacketValidationContext),

    /// Error encountered while attempting to encode an outbound packet
    EncodingFailure(EncodingFailureContext),

    /// Session registry failure: unknown provider, duplicate provider registration, etc...
    SessionFailure(SessionFailureContext),

    /// Generic error wrapping std::io::Error
    StdIoError(StdIoErrorContext),

    /// Generic error associated with loading TLS configuration
    TlsError(TlsErrorContext),

    /// Error to be used when no other error variant is appropriate.
    OtherError(OtherErrorContext),
}

impl GateError {

    pub(crate) fn new_malformed_header(source: impl Into<Box<dyn Error + Send + Sync + 'static>>) -> Self {
        GateError::MalformedHeader(
            MalformedHeaderContext {
                source : source.into()
            }
        )
    }

    pub(crate) fn new_malformed_variable_header(packet_type: PacketType, source: impl Into<Box<dyn Error + Send + Sync + 'static>>) -> Self {
        GateError::MalformedVariableHeader(
            MalformedVariableHeaderContext {
                packet_type,
                source : source.into()
            }
        )
    }

    pub(crate) fn new_unsupported_protocol_version(protocol_version: u8) -> Self {
        GateError::UnsupportedProtocolVersion(
            UnsupportedProtocolVersionContext {
                protocol_version
            }
        )
    }

    pub(crate) fn new_identifier_rejected(source: impl Into<Box<dyn Error + Send + Sync + 'static>>) -> Self {
        GateError::IdentifierRejected(
            IdentifierRejectedContext {
                source : source.into()
            }
        )
    }

    pub(crate) fn new_timeout() -> Self {
        GateError::Timeout(
            TimeoutContext {
            }
        )
    }

    pub(crate) fn new_transport_closed(source: impl Into<Box<dyn Error + Send + Sync + 'static>>) -> Self {
        GateError::TransportClosed(
            TransportClosedContext {
                source : source.into()
            }
        )
    }

    pub(crate) fn new_invalid_wait_target(packet_type: PacketType) -> Self {
        GateError::InvalidWaitTarget(
            InvalidWaitTargetContext {
                packet_type
            }
        )
    }

    pub(crate) fn new_duplicate_packet_id(packet_id: u16) -> Self {
        GateError::DuplicatePacketId(
            DuplicatePacketIdContext {
                packet_id
            }
        )
    }

    pub(crate) fn new_packet_validation(packet_type: PacketType, source: impl Into<Box<dyn Error + Send + Sync + 'static>>) -> Self {
        GateError::PacketValidation(
            PacketValidationContext {
                packet_type,
                source : source.into()
            }
        )
    }

    pub(crate) fn new_encoding_failure(source: impl Into<Box<dyn Error + Send + Sync + 'static>>) -> Self {
        GateError::EncodingFailure(
            EncodingFailureContext {
                source : source.into()
            }
        )
    }

    pub(crate) fn new_session_failure(source: impl Into<Box<dyn Error + Send + Sync + 'static>>) -> Self {
        GateError::SessionFailure(
            SessionFailureContext {
                source : source.into()
            }
        )
    }

    /// Constructs a StdIoError variant from an existing error.  Typically this should be a
    /// std::io::Error
    #[doc(hidden)]
    pub fn new_std_io_error(source: impl Into<Box<dyn Error + Send + Sync + 'static>>) -> Self {
        GateError::StdIoError(
            StdIoErrorContext {
                source : source.into()
            }
        )
    }

    /// Constructs a new TlsError variant from an existing error.  Typically this should be
    /// an error surfacing from a third-party TLS library or an attempt to load certificates
    /// or keys for one.
    #[doc(hidden)]
    pub fn new_tls_error(source: impl Into<Box<dyn Error + Send + Sync + 'static>>) -> Self {
        GateError::TlsError(
            TlsErrorContext {
                source : source.into()
            }
        )
    }

    /// Constructs a new OtherError variant from an existing error.  Use this to wrap errors that
    /// do not fall into any appropriate existing category.
    #[doc(hidden)]
    pub fn new_other_error(source: impl Into<Box<dyn Error + Send + Sync + 'static>>) -> Self {
        GateError::OtherError (
            OtherErrorContext {
                source : source.into()
            }
        )
    }

    /// Returns the Connack return code that should be written back to a client whose
    /// handshake failed with this error, if any.
    pub fn connack_return_code(&self) -> Option<ConnectReturnCode> {
        match self {
            GateError::UnsupportedProtocolVersion(_) => { Some(ConnectReturnCode::UnacceptableProtocolVersion) }
            GateError::IdentifierRejected(_) => { Some(ConnectReturnCode::IdentifierRejected) }
            _ => { None }
        }
    }

    /// True if this error is a read deadline expiration rather than a transport or protocol
    /// failure.
    pub fn is_timeout(&self) -> bool {
        matches!(self, GateError::Timeout(_))
    }
}

impl Error for GateError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            GateError::MalformedHeader(context) => {
                Some(context.source.as_ref())
            }
            GateError::MalformedVariableHeader(context) => {
                Some(context.source.as_ref())
            }
            GateError::IdentifierRejected(context) => {
                Some(context.source.as_ref())
            }
            GateError::TransportClosed(context) => {
                Some(context.source.as_ref())
            }
            GateError::PacketValidation(context) => {
                Some(context.source.as_ref())
            }
            GateError::EncodingFailure(context) => {
                Some(context.source.as_ref())
            }
            GateError::SessionFailure(context) => {
                Some(context.source.as_ref())
            }
            GateError::StdIoError(context) => {
                Some(context.source.as_ref())
            }
            GateError::TlsError(context) => {
                Some(context.source.as_ref())
            }
            GateError::OtherError(context) => {
                Some(context.source.as_ref())
            }
            _ => { None }
        }
    }
}

impl fmt::Display for GateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GateError::MalformedHeader(_) => {
                write!(f, "fixed header of an incoming packet is malformed")
            }
            GateError::MalformedVariableHeader(context) => {
                write!(f, "{} variable header or payload is malformed", context.packet_type)
            }
            GateError::UnsupportedProtocolVersion(context) => {
                write!(f, "connect packet requested unsupported protocol level {}", context.protocol_version)
            }
            GateError::IdentifierRejected(_) => {
                write!(f, "client identifier or credentials were rejected")
            }
            GateError::Timeout(_) => {
                write!(f, "read deadline exceeded")
            }
            GateError::TransportClosed(_) => {
                write!(f, "transport was closed")
            }
            GateError::InvalidWaitTarget(context) => {
                write!(f, "{} cannot be tracked in an ack queue", context.packet_type)
            }
            GateError::DuplicatePacketId(context) => {
                write!(f, "packet id {} is already in flight", context.packet_id)
            }
            GateError::PacketValidation(context) => {
                write!(f, "{} contains a field that violates the mqtt protocol", context.packet_type)
            }
            GateError::EncodingFailure(_) => {
                write!(f, "failure encountered while encoding an outbound MQTT packet")
            }
            GateError::SessionFailure(_) => {
                write!(f, "session registry failure; source contains further details")
            }
            GateError::StdIoError(_) => {
                write!(f, "generic error wrapper for std::io::Error when no more specialized error is appropriate; source contains further details")
            }
            GateError::TlsError(_) => {
                write!(f, "generic error when setting up a tls context")
            }
            GateError::OtherError(_) => {
                write!(f, "fallback error type; source contains further details")
            }
        }
    }
}

impl From<std::io::Error> for GateError {
    fn from(error: std::io::Error) -> Self {
        match error.kind() {
            std::io::ErrorKind::UnexpectedEof => { GateError::new_transport_closed(error) }
            std::io::ErrorKind::TimedOut => { GateError::new_timeout() }
            _ => { GateError::new_std_io_error(error) }
        }
    }
}

impl From<tokio::time::error::Elapsed> for GateError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        GateError::new_timeout()
    }
}

impl From<core::str::Utf8Error> for GateError {
    fn from(err: core::str::Utf8Error) -> Self {
        GateError::new_other_error(err)
    }
}

#[cfg(feature = "tokio-rustls")]
impl From<rustls::Error> for GateError {
    fn from(err: rustls::Error) -> Self {
        GateError::new_tls_error(err)
    }
}

/// Crate-wide result type for functions that can fail
pub type GateResult<T> = Result<T, GateError>;

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn connack_return_code_mapping() {
        assert_eq!(Some(ConnectReturnCode::UnacceptableProtocolVersion), GateError::new_unsupported_protocol_version(5).connack_return_code());
        assert_eq!(Some(ConnectReturnCode::IdentifierRejected), GateError::new_identifier_rejected("bad").connack_return_code());
        assert_eq!(None, GateError::new_malformed_header("bad").connack_return_code());
        assert_eq!(None, GateError::new_timeout().connack_return_code());
    }

    #[test]
    fn io_error_conversion() {
        let eof : GateError = std::io::Error::from(std::io::ErrorKind::UnexpectedEof).into();
        assert_matches!(eof, GateError::TransportClosed(_));

        let timed_out : GateError = std::io::Error::from(std::io::ErrorKind::TimedOut).into();
        assert!(timed_out.is_timeout());

        let reset : GateError = std::io::Error::from(std::io::ErrorKind::ConnectionReset).into();
        assert_matches!(reset, GateError::StdIoError(_));
    }
}
