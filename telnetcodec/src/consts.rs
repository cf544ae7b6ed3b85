//
// Copyright 2017-2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Telnet protocol byte constants (RFC 854 plus the MUD option subset).

/// Interpret As Command
pub const IAC: u8 = 255;
/// Demand the other party stop performing an option
pub const DONT: u8 = 254;
/// Request the other party perform an option
pub const DO: u8 = 253;
/// Refuse to perform an option
pub const WONT: u8 = 252;
/// Offer to perform an option
pub const WILL: u8 = 251;
/// Subnegotiation Begin
pub const SB: u8 = 250;
/// Go Ahead
pub const GA: u8 = 249;
/// Subnegotiation End
pub const SE: u8 = 240;

/// Telnet options this front end knows about.
pub mod option {
    /// Mud Server Status Protocol
    pub const MSSP: u8 = 70;
    /// Character set negotiation
    pub const CHARSET: u8 = 42;
    /// Negotiate About Window Size
    pub const NAWS: u8 = 31;
    /// End of Record
    pub const EOR: u8 = 25;
    /// Terminal Type
    pub const TTYPE: u8 = 24;
    /// Echo
    pub const ECHO: u8 = 1;

    /// MSSP subnegotiation markers.
    pub mod mssp {
        /// Variable name marker
        pub const VAR: u8 = 1;
        /// Variable value marker
        pub const VAL: u8 = 2;
    }
}

/// NUL byte
pub const NUL: u8 = 0;

/// Commands that take a single option byte after the IAC.
pub const NEGOTIATIONS: [u8; 4] = [WILL, WONT, DO, DONT];
