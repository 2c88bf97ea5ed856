#![doc = "dirupload-core: core pipeline for dirupload."]

//! This crate holds the upload pipeline: discovering files under a root directory,
//! provisioning the destination container and uploading files with bounded
//! concurrency. Transport and credentials live behind [`contract::BlobBackend`].
//!
//! # Usage
//! Build an [`config::UploadConfig`], pick a backend and call [`synchronise::synchronise`].

pub mod config;
pub mod contract;
pub mod discover;
pub mod error;
pub mod provision;
pub mod scheduler;
pub mod synchronise;
pub mod transfer;
