//! 自定义域名 SSL 上传校验
//!
//! 把用户上传的私钥与证书（可附带中间证书链）解析、检查，
//! 最终给出一个 `ValidationOutcome`：接受并返回规范化 PEM，或拒绝并给出原因。

pub mod cert;
pub mod chain;
pub mod decoder;
pub mod error;
pub mod key;
pub mod outcome;
pub mod pipeline;
pub mod trust;

#[cfg(test)]
pub(crate) mod test_support;

// ============ 重新导出常用类型 ============

// 错误处理
pub use error::{Result, SslError};

// 解析结果
pub use cert::{Certificate, CertificateSummary, inspect_cert};
pub use chain::{CandidateBundle, CertificateChain, assemble, validate_chain};
pub use key::{KeyAlgorithm, PrivateKey, PublicKeyMaterial, inspect_key};
pub use decoder::{BlockKind, DecodedPem, PemBlock, decode};

// 校验入口
pub use outcome::{AcceptedPair, RejectReason, Rejection, ValidationOutcome};
pub use pipeline::{UploadValidator, ValidatorOptions, validate_upload};
pub use trust::{NoTrustAnchors, PemTrustStore, TrustAnchors};
