// Copyright (c) 2026 Emberchain
// Licensed under the Apache License, Version 2.0

//! Key management and signature plumbing.

pub mod wallet;
