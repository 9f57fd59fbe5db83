// Copyright (c) 2026 Emberchain
// Licensed under the Apache License, Version 2.0

#![forbid(unsafe_code)]
#![allow(missing_docs)]

//! Networking: wire codec, UDP transport, peer table, message processor.

pub mod peers;
pub mod processor;
pub mod udp;
pub mod wire;
