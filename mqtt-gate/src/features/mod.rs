/*
 * Copyright Bret Ambrose. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

/*!
Module that encompasses feature-specific logic (currently TLS termination).
 */

#[cfg(feature = "tokio-rustls")]
pub mod rustls;
