// Copyright 2026 Daniel Pelikan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Service identifier and timing defaults.

use std::time::Duration;
use uuid::Uuid;

/// Service UUID both ends of a pairing agree on to find the RFCOMM channel.
pub const SERVICE_UUID: Uuid = Uuid::from_u128(0xfeafaa8c_e0f6_11eb_ba80_0242ac130004);

/// Default limit for a single connect attempt (BlueZ backend).
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default length of a scan started by the BlueZ backend. Android's inquiry
/// runs for about twelve seconds; BlueZ keeps scanning until told to stop.
pub const DEFAULT_SCAN_DURATION: Duration = Duration::from_secs(12);
