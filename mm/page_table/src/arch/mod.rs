// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 KylinSoft Co., Ltd. <https://www.kylinos.cn/>
// See LICENSES for license details.

pub mod riscv;

pub use self::riscv::{PagingMode, Rv32PageEntry, Rv64PageEntry, RvFlags, Sv32MetaData, Sv39MetaData};
