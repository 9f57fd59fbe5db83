// Copyright (c) 2026 Emberchain
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

#![forbid(unsafe_code)]

//! Generate a wallet key and print its address (hex public key).

use anyhow::{anyhow, Result};
use emberchain::core::security::wallet::Wallet;
use emberchain::core::types::Address;
use std::path::Path;

fn main() -> Result<()> {
    let data_dir = std::env::args().nth(1).unwrap_or_else(|| "data".to_string());
    std::fs::create_dir_all(&data_dir)?;

    let wallet = Wallet::open(Path::new(&data_dir), Address::BURN)
        .map_err(|e| anyhow!("open wallet: {e}"))?;
    let address = wallet
        .generate()
        .map_err(|e| anyhow!("generate key: {e}"))?;

    println!("{address}");
    Ok(())
}
