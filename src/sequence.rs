//! 按 key 递增的序号守卫
//!
//! 异步更新开始时领取序号，完成时只有仍持有该 key 最新序号的结果才允许写回。
//! 以开始顺序决定最终结果，与完成顺序无关。

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Mutex;

#[derive(Debug)]
struct Sequences<K> {
    /// 所有 key 共用的计数器，`forget` 之后也不会复用旧序号
    counter: u64,
    latest: HashMap<K, u64>,
}

#[derive(Debug)]
pub struct SequenceGuard<K> {
    inner: Mutex<Sequences<K>>,
}

impl<K> Default for SequenceGuard<K> {
    fn default() -> Self {
        Self {
            inner: Mutex::new(Sequences {
                counter: 0,
                latest: HashMap::new(),
            }),
        }
    }
}

impl<K: Eq + Hash + Clone> SequenceGuard<K> {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Sequences<K>> {
        self.inner.lock().unwrap_or_else(|e| {
            log::warn!("[SequenceGuard] 锁已毒化，使用恢复值: {e}");
            e.into_inner()
        })
    }

    /// 领取 key 的下一个序号
    pub fn begin(&self, key: &K) -> u64 {
        let mut sequences = self.lock();
        sequences.counter += 1;
        let next = sequences.counter;
        sequences.latest.insert(key.clone(), next);
        next
    }

    /// 序号是否仍为 key 的最新序号
    pub fn is_latest(&self, key: &K, seq: u64) -> bool {
        self.lock().latest.get(key).copied() == Some(seq)
    }

    /// 丢弃 key 的记录，之前领取的序号全部失效
    pub fn forget(&self, key: &K) {
        self.lock().latest.remove(key);
    }
}
