// src/cipher/mod.rs

//! 还原站点前端脚本故意打乱的下载地址。
//!
//! 两个算法都是纯函数：相同输入永远得到相同输出。输入缺失或格式不对时
//! 返回 `None`，由调用方跳过该条目，不会中断整批任务。

pub mod license_shuffle;
pub mod time_xor;
