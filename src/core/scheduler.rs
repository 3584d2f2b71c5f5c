//! 主线程任务调度
//!
//! 宿主只允许在主线程上访问脚本对象。原生代码若在其他线程上需要触碰宿主，
//! 必须通过异步调度原语把任务投递到主线程，而不能直接调用宿主原语。
//!
//! ## 功能特性
//!
//! - 任意线程投递任务，立即返回
//! - 主线程批量/限量处理任务
//! - 关闭后拒绝新任务

use crossbeam_channel::{unbounded, Receiver, Sender};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crate::core::thread_guard::ThreadAffinity;

/// 主线程任务
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// 投递到主线程的调度原语
///
/// 对应宿主的 post-to-main-thread 入口（NPAPI 的 `PluginThreadAsyncCall`，
/// COM 宿主的窗口消息）。
pub trait TaskScheduler: Send + Sync {
    /// 投递任务，返回是否被接受
    fn schedule(&self, task: Task) -> bool;
}

/// 基于通道的主线程任务队列
///
/// 宿主胶水层在自己的消息循环中调用 `process_main_thread_tasks()`。
///
/// # 示例
///
/// ```rust
/// use script_bridge::core::scheduler::{MainThreadQueue, TaskScheduler};
///
/// let queue = MainThreadQueue::new();
/// let handle = queue.handle();
/// std::thread::spawn(move || {
///     handle.schedule(Box::new(|| println!("on the main thread")));
/// })
/// .join()
/// .unwrap();
///
/// assert_eq!(queue.process_main_thread_tasks(), 1);
/// ```
pub struct MainThreadQueue {
    /// 主线程任务接收器
    main_thread_rx: Receiver<Task>,
    handle: MainThreadHandle,
    affinity: ThreadAffinity,
}

/// 可跨线程克隆的投递句柄
#[derive(Clone)]
pub struct MainThreadHandle {
    main_thread_tx: Sender<Task>,
    shut_down: Arc<AtomicBool>,
    posted: Arc<AtomicU64>,
}

impl MainThreadQueue {
    /// 创建任务队列，当前线程即为主线程
    pub fn new() -> Self {
        let (main_thread_tx, main_thread_rx) = unbounded();
        Self {
            main_thread_rx,
            handle: MainThreadHandle {
                main_thread_tx,
                shut_down: Arc::new(AtomicBool::new(false)),
                posted: Arc::new(AtomicU64::new(0)),
            },
            affinity: ThreadAffinity::current(),
        }
    }

    pub fn handle(&self) -> MainThreadHandle {
        self.handle.clone()
    }

    pub fn affinity(&self) -> &ThreadAffinity {
        &self.affinity
    }

    /// 在主线程执行任务
    ///
    /// 将任务加入队列，等待下次调用 `process_main_thread_tasks()` 时执行。
    pub fn run_on_main_thread<F>(&self, task: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        self.handle.schedule(Box::new(task))
    }

    /// 处理主线程任务队列（应在主循环中调用）
    ///
    /// 处理队列中的所有任务直到队列为空，返回处理的任务数。
    /// 任务执行期间投递的新任务也会在本次调用中处理。
    pub fn process_main_thread_tasks(&self) -> usize {
        self.affinity.assert_main_thread("process_main_thread_tasks");
        let mut processed = 0;
        while let Ok(task) = self.main_thread_rx.try_recv() {
            task();
            processed += 1;
        }
        processed
    }

    /// 处理主线程任务队列（限制数量）
    ///
    /// # 参数
    ///
    /// * `max_tasks` - 本次最多处理的任务数
    pub fn process_main_thread_tasks_limited(&self, max_tasks: usize) -> usize {
        self.affinity
            .assert_main_thread("process_main_thread_tasks_limited");
        let mut processed = 0;
        while processed < max_tasks {
            match self.main_thread_rx.try_recv() {
                Ok(task) => {
                    task();
                    processed += 1;
                }
                Err(_) => break,
            }
        }
        processed
    }

    pub fn pending(&self) -> usize {
        self.main_thread_rx.len()
    }

    /// 关闭队列，之后的投递全部被拒绝，已排队任务被丢弃
    pub fn shutdown(&self) {
        self.handle.shut_down.store(true, Ordering::SeqCst);
        let dropped = self.main_thread_rx.try_iter().count();
        if dropped > 0 {
            tracing::debug!(target: "bridge::scheduler", dropped, "discarded pending main thread tasks");
        }
    }
}

impl Default for MainThreadQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl MainThreadHandle {
    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    /// 累计投递成功的任务数
    pub fn posted_count(&self) -> u64 {
        self.posted.load(Ordering::Relaxed)
    }
}

impl TaskScheduler for MainThreadHandle {
    fn schedule(&self, task: Task) -> bool {
        if self.is_shut_down() {
            return false;
        }
        match self.main_thread_tx.send(task) {
            Ok(()) => {
                self.posted.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(_) => false,
        }
    }
}

impl TaskScheduler for MainThreadQueue {
    fn schedule(&self, task: Task) -> bool {
        self.handle.schedule(task)
    }
}
