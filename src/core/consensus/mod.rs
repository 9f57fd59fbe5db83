// Copyright (c) 2026 Emberchain
// Licensed under the Apache License, Version 2.0

//! Conflict resolution by delegated representative voting.

pub mod conflicts;
pub mod election;
pub mod signing;

pub use conflicts::Conflicts;
pub use election::Election;
