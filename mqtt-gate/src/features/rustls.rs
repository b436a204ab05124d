/*
 * Copyright Bret Ambrose. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

/*!
Functionality for terminating TLS with [`rustls`](https://crates.io/crates/rustls) before a
stream is handed to the gateway.
 */

extern crate rustls;
extern crate rustls_pemfile;
extern crate rustls_pki_types;

use crate::error::{GateError, GateResult};

use ::rustls::pki_types::PrivateKeyDer;
use log::*;
use std::path::Path;
use std::sync::Arc;
use tokio_rustls::TlsAcceptor;

/// Builds a server TLS acceptor from a PEM certificate chain file and a PEM private key file.
///
/// The key may be PKCS#1, PKCS#8 or SEC1 encoded; the first key found in the file is used.
pub fn build_tls_acceptor<P, Q>(cert_path: P, key_path: Q) -> GateResult<TlsAcceptor> where P : AsRef<Path>, Q : AsRef<Path> {
    let cert_bytes = std::fs::read(cert_path.as_ref())?;
    let key_bytes = std::fs::read(key_path.as_ref())?;

    let acceptor = build_tls_acceptor_from_pem(&cert_bytes, &key_bytes)?;
    info!("tls - loaded certificate chain from {}", cert_path.as_ref().display());

    Ok(acceptor)
}

/// Builds a server TLS acceptor from in-memory PEM data
pub fn build_tls_acceptor_from_pem(cert_bytes: &[u8], key_bytes: &[u8]) -> GateResult<TlsAcceptor> {
    let certs = build_certs(cert_bytes)?;
    let private_key = build_private_key(key_bytes)?;

    let provider = Arc::new(::rustls::crypto::ring::default_provider());
    let config = ::rustls::ServerConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()?
        .with_no_client_auth()
        .with_single_cert(certs, private_key)?;

    Ok(TlsAcceptor::from(Arc::new(config)))
}

fn build_private_key(key_bytes: &[u8]) -> GateResult<PrivateKeyDer<'static>> {
    let mut reader = std::io::BufReader::new(key_bytes);

    loop {
        let read_pem_result = rustls_pemfile::read_one(&mut reader);
        match read_pem_result {
            Ok(Some(rustls_pemfile::Item::Pkcs1Key(key))) => return Ok(key.into()),
            Ok(Some(rustls_pemfile::Item::Pkcs8Key(key))) => return Ok(key.into()),
            Ok(Some(rustls_pemfile::Item::Sec1Key(key))) => return Ok(key.into()),
            Ok(None) => {
                let message = "build_private_key - no valid private keys found";
                error!("{}", message);
                return Err(GateError::new_tls_error(message));
            }
            Ok(_) => {}
            Err(error) => {
                error!("build_private_key - failed to parse private key pem data: {}", error);
                return Err(GateError::new_tls_error(error));
            }
        }
    }
}

fn build_certs(certificate_bytes: &[u8]) -> GateResult<Vec<rustls_pki_types::CertificateDer<'static>>> {
    let mut reader = std::io::BufReader::new(certificate_bytes);

    let certs = rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(GateError::new_tls_error)?;

    if certs.is_empty() {
        let message = "build_certs - no certificates found";
        error!("{}", message);
        return Err(GateError::new_tls_error(message));
    }

    Ok(certs)
}
