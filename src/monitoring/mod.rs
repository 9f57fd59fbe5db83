// Copyright (c) 2026 Emberchain
// Licensed under the Apache License, Version 2.0

//! Observability.

pub mod metrics;
