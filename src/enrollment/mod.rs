//! Enrollment Image Provisioner
//!
//! ## 概要
//! 生体登録画像セットのプロビジョニングを担当する。
//! - Register: 画像5枚の検証 → 逐次アップロード → 署名付きURL発行 →
//!   face_registered イベント送出
//! - Delete: プレフィックス一覧 → 一括削除 → face_deleted イベント送出
//!
//! ## モジュール構成
//! - `types`: 型定義・定数
//! - `service`: プロビジョニングサービス実装
//!
//! ## 部分失敗
//! アップロード途中で失敗した場合、アップロード済みオブジェクトを
//! ベストエフォートで削除してから `StorageError` を返す。

pub mod service;
pub mod types;

pub use service::EnrollmentService;
pub use types::{DeleteOutcome, FaceImage, RegisterOutcome, REQUIRED_IMAGE_COUNT};
