//! エージェントログバッファ
//!
//! Computer毎に保持する追記専用ログ。ランチャーとリスナーエラー報告が
//! 並行して追記できるよう、行単位でロックする。

use std::sync::{Arc, Mutex, MutexGuard};

/// 追記専用のエージェントログ
///
/// クローンはバッファを共有する。
#[derive(Debug, Clone, Default)]
pub struct AgentLog {
    lines: Arc<Mutex<Vec<String>>>,
}

impl AgentLog {
    /// 空のログバッファを作成する
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<String>> {
        // ポイズニングされてもログバッファ自体は壊れないため継続する
        match self.lines.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// 1行追記する
    pub fn append(&self, line: impl Into<String>) {
        self.lock().push(line.into());
    }

    /// 全内容を改行区切りの文字列として返す
    pub fn contents(&self) -> String {
        let lines = self.lock();
        let mut out = String::new();
        for line in lines.iter() {
            out.push_str(line);
            out.push('\n');
        }
        out
    }

    /// 指定した部分文字列を含むか判定する
    pub fn contains(&self, needle: &str) -> bool {
        self.lock().iter().any(|line| line.contains(needle))
    }

    /// 記録済み行数
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// 空か判定する
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// 全行を破棄する
    pub fn clear(&self) {
        self.lock().clear();
    }
}
