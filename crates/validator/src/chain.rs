//! 证书链组装与校验
//!
//! 组装阶段只保留上传顺序；叶子由私钥匹配决定。
//! 校验阶段不依赖位置相邻：对当前证书，在尚未链接的证书里搜索它的签发者，
//! 走不通时回溯，因此上传顺序错误可以自我修正，只有真正断开或不完整的链才会被拒绝。

use crate::cert::{Certificate, inspect_cert};
use crate::decoder::PemBlock;
use crate::error::{Result, SslError};
use crate::key::PublicKeyMaterial;
use crate::trust::TrustAnchors;
use chrono::{DateTime, Utc};
use tracing::debug;

/// 按上传顺序排列的候选证书
#[derive(Debug, Clone)]
pub struct CandidateBundle {
    certs: Vec<Certificate>,
}

/// 逐个检查证书块，保持上传顺序
pub fn assemble(blocks: &[&PemBlock]) -> Result<CandidateBundle> {
    let certs = blocks
        .iter()
        .map(|block| inspect_cert(block))
        .collect::<Result<Vec<_>>>()?;
    if certs.is_empty() {
        return Err(SslError::invalid_certificate("no certificate block found"));
    }
    Ok(CandidateBundle { certs })
}

impl CandidateBundle {
    /// 公钥与私钥匹配的证书位置。
    ///
    /// 有多张匹配时（例如过期证书与续期证书共用一把私钥）优先取 `now` 时刻有效的那张，
    /// 都无效时取上传顺序中的第一张。
    pub fn position_of_key(&self, key: &PublicKeyMaterial, now: DateTime<Utc>) -> Option<usize> {
        let mut matching = self
            .certs
            .iter()
            .enumerate()
            .filter(|(_, cert)| cert.matches_key(key))
            .peekable();
        let first = matching.peek().map(|(index, _)| *index)?;
        matching
            .find(|(_, cert)| cert.is_valid_at(now))
            .map(|(index, _)| index)
            .or(Some(first))
    }

    /// 把 `leaf_index` 处的证书移到首位，其余保持上传顺序
    pub fn into_leaf_first(mut self, leaf_index: usize) -> Vec<Certificate> {
        if leaf_index < self.certs.len() {
            let leaf = self.certs.remove(leaf_index);
            self.certs.insert(0, leaf);
        }
        self.certs
    }
}

/// 校验通过的证书链：0 号为叶子，之后每张都是前一张的签发者
#[derive(Debug, Clone)]
pub struct CertificateChain {
    certs: Vec<Certificate>,
}

impl CertificateChain {
    pub fn leaf(&self) -> &Certificate {
        &self.certs[0]
    }

    pub fn len(&self) -> usize {
        self.certs.len()
    }
}

/// 校验证书链。`candidates[0]` 必须是已确认的叶子。
///
/// 从叶子出发做深度优先搜索：每一步在尚未链接的证书里逐个尝试当前证书的签发者
/// （主体名与签名都要匹配），走不通就回退换下一个候选，直到所有证书都链接上。
/// 同一主体同一公钥的交叉签名证书因此与上传顺序无关。
///
/// 不存在完整链接时，在搜索到的最深位置返回 `BrokenChain`。
/// 配置了信任锚时，链顶还必须由信任锚签发（或本身就是信任锚）；
/// 只有不受信任的完整链接时返回 `UntrustedChain`。
pub fn validate_chain(
    candidates: Vec<Certificate>,
    anchors: &dyn TrustAnchors,
) -> Result<CertificateChain> {
    if candidates.is_empty() {
        return Err(SslError::invalid_certificate("empty certificate chain"));
    }

    let searched = {
        let mut search = LinkSearch::new(&candidates, anchors);
        if search.run() {
            Ok(search.path)
        } else {
            Err((search.untrusted_top, search.deepest))
        }
    };

    let (untrusted_top, deepest) = match searched {
        Ok(path) => {
            let mut slots: Vec<Option<Certificate>> = candidates.into_iter().map(Some).collect();
            let linked: Vec<Certificate> = path.iter().filter_map(|&i| slots[i].take()).collect();
            debug!(length = linked.len(), "certificate chain linked");
            return Ok(CertificateChain { certs: linked });
        }
        Err(failure) => failure,
    };

    if let Some(top) = untrusted_top {
        return Err(SslError::UntrustedChain {
            subject: candidates[top].subject().to_string(),
        });
    }

    let index = deepest.len() - 1;
    let stuck = &candidates[deepest[index]];
    debug!(
        index,
        subject = %stuck.subject(),
        unlinked = candidates.len() - deepest.len(),
        "no issuer found for chain link"
    );
    Err(SslError::BrokenChain {
        index,
        subject: stuck.subject().to_string(),
    })
}

/// 链接搜索状态；签发关系预先算好，回溯时不重复验签
struct LinkSearch<'a> {
    certs: &'a [Certificate],
    anchors: &'a dyn TrustAnchors,
    // issued_by[child][parent]
    issued_by: Vec<Vec<bool>>,
    used: Vec<bool>,
    path: Vec<usize>,
    deepest: Vec<usize>,
    untrusted_top: Option<usize>,
}

impl<'a> LinkSearch<'a> {
    fn new(certs: &'a [Certificate], anchors: &'a dyn TrustAnchors) -> Self {
        let issued_by = certs
            .iter()
            .enumerate()
            .map(|(child, cert)| {
                certs
                    .iter()
                    .enumerate()
                    .map(|(parent, issuer)| child != parent && cert.is_issued_by(issuer))
                    .collect()
            })
            .collect();
        let mut used = vec![false; certs.len()];
        used[0] = true;
        Self {
            certs,
            anchors,
            issued_by,
            used,
            path: vec![0],
            deepest: vec![0],
            untrusted_top: None,
        }
    }

    fn run(&mut self) -> bool {
        if self.path.len() > self.deepest.len() {
            self.deepest = self.path.clone();
        }

        let current = self.path[self.path.len() - 1];
        if self.path.len() == self.certs.len() {
            if !self.anchors.is_configured() || self.anchors.is_trusted_issuer(&self.certs[current])
            {
                return true;
            }
            if self.untrusted_top.is_none() {
                self.untrusted_top = Some(current);
            }
            return false;
        }

        for parent in 0..self.certs.len() {
            if self.used[parent] || !self.issued_by[current][parent] {
                continue;
            }
            self.used[parent] = true;
            self.path.push(parent);
            if self.run() {
                return true;
            }
            self.path.pop();
            self.used[parent] = false;
        }
        false
    }
}
