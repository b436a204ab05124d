/*
 * Copyright Bret Ambrose. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

use tokio::io::{AsyncRead, AsyncWrite};

/// A byte stream a connection runs over.
///
/// Reads are bounded by deadlines applied by the connection itself, writes go through a writer
/// lock owned by the connection, and dropping or shutting down the stream closes it.  TLS versus
/// plain TCP is settled before a transport ever reaches [`crate::gateway::Gateway::accept`], so a
/// `TcpStream`, a `tokio_rustls::server::TlsStream<TcpStream>` and an in-memory
/// `tokio::io::DuplexStream` all qualify.
pub trait GatewayTransport : AsyncRead + AsyncWrite + Unpin + Send + Sync + 'static {}

impl<T> GatewayTransport for T where T : AsyncRead + AsyncWrite + Unpin + Send + Sync + 'static {}
