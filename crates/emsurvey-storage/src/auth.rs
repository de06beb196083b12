use anyhow::Result;
use base64::{engine::general_purpose, Engine as _};
use rand::Rng;

/// 生成一个 32 字节的加密安全随机 token（Base64 编码）
pub fn generate_token() -> String {
    let mut rng = rand::thread_rng();
    let token_bytes: [u8; 32] = rng.gen();
    general_purpose::STANDARD.encode(token_bytes)
}

/// 使用 bcrypt 对密码进行哈希
pub fn hash_password(password: &str) -> Result<String> {
    let hash = bcrypt::hash(password, bcrypt::DEFAULT_COST)?;
    Ok(hash)
}

/// 验证密码是否匹配哈希值
pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    Ok(bcrypt::verify(password, hash)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify_password() {
        let hash = hash_password("s3cret").expect("hash should succeed");
        assert_ne!(hash, "s3cret");
        assert!(verify_password("s3cret", &hash).expect("verify should succeed"));
        assert!(!verify_password("wrong", &hash).expect("verify should succeed"));
    }

    #[test]
    fn generated_tokens_differ() {
        let a = generate_token();
        let b = generate_token();
        assert_eq!(a.len(), 44);
        assert_ne!(a, b);
    }
}
