/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

pub mod accumulator;
pub mod config;
pub mod input;
pub mod pipeline;
pub mod stat;

#[cfg(test)]
mod testutil;
