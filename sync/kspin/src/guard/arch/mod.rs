// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 KylinSoft Co., Ltd. <https://www.kylinos.cn/>
// See LICENSES for license details.

cfg_if::cfg_if! {
    if #[cfg(all(target_os = "none", any(target_arch = "riscv32", target_arch = "riscv64")))] {
        mod riscv;
        pub use self::riscv::*;
    } else {
        /// Hosted builds have no interrupts to mask.
        #[inline]
        pub fn save_disable() -> usize {
            0
        }

        #[inline]
        pub fn restore(_flags: usize) {}
    }
}
