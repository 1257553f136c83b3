// SPDX-License-Identifier: Mulan PSL v2
/*
 * Copyright (c) 2024 Huawei Technologies Co., Ltd.
 * growmap is licensed under Mulan PSL v2.
 * You can use this software according to the terms and conditions of the Mulan PSL v2.
 * You may obtain a copy of Mulan PSL v2 at:
 *         http://license.coscl.org.cn/MulanPSL2
 *
 * THIS SOFTWARE IS PROVIDED ON AN "AS IS" BASIS, WITHOUT WARRANTIES OF ANY KIND,
 * EITHER EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED TO NON-INFRINGEMENT,
 * MERCHANTABILITY OR FIT FOR A PARTICULAR PURPOSE.
 * See the Mulan PSL v2 for more details.
 */

//! Capacity growth policies.

pub const ONE_MB: usize = 1024 * 1024;
pub const ONE_GB: usize = 1024 * ONE_MB;
pub const TWO_GB: usize = 2 * ONE_GB;

/// Computes the next capacity from the current one and the required minimum.
///
/// Implementations must be pure and return a value that is no smaller than
/// either argument.
pub trait GrowthPolicy: Send + Sync {
    fn next(&self, current: usize, at_least: usize) -> usize;
}

impl<F> GrowthPolicy for F
where
    F: Fn(usize, usize) -> usize + Send + Sync,
{
    fn next(&self, current: usize, at_least: usize) -> usize {
        self(current, at_least)
    }
}

/// Doubles below 2GB, then grows by 1GB steps. The result is aligned up to 1MB.
pub fn default_growth_policy(current: usize, at_least: usize) -> usize {
    let proposed = if current < TWO_GB {
        current.saturating_mul(2)
    } else {
        current.saturating_add(ONE_GB)
    };

    align_up(proposed.max(at_least), ONE_MB)
}

/// Rounds `n` up to a multiple of `align`, which must be a power of two.
/// Saturates at the largest aligned value instead of wrapping.
#[inline]
pub fn align_up(n: usize, align: usize) -> usize {
    debug_assert!(align.is_power_of_two());

    let mask = align - 1;
    match n.checked_add(mask) {
        Some(n) => n & !mask,
        None => usize::MAX & !mask,
    }
}
