// src/extractor/crawl.rs

//! 各站点共用的惰性抓取引擎。
//!
//! 站点适配器只需描述两件事：某一页上有哪些线索 (`discover`)，以及如何把一条
//! 线索解析成真实的下载项 (`resolve`)。引擎负责翻页、去重和出错后的取舍，
//! 并且只在流被轮询时才发出网络请求。

use super::ItemStream;
use crate::{error::*, models::DownloadItem};
use async_trait::async_trait;
use futures::{StreamExt, stream};
use log::{debug, warn};
use std::collections::{HashSet, VecDeque};

/// 发现阶段得到的线索
#[derive(Debug, Clone)]
pub(crate) enum Lead {
    /// 需要再请求一次 (详情页或二级 API) 才能得到下载项
    Follow {
        target: String,
        collection: Option<String>,
    },
    /// 已经是完整的下载项
    Ready(DownloadItem),
}

impl Lead {
    pub(crate) fn follow(target: impl Into<String>, collection: Option<String>) -> Self {
        Lead::Follow {
            target: target.into(),
            collection,
        }
    }

    fn key(&self) -> &str {
        match self {
            Lead::Follow { target, .. } => target,
            Lead::Ready(item) => item.download_url(),
        }
    }
}

#[async_trait]
pub(crate) trait PagedSource: Send + Sync {
    /// 返回第 `page` 页 (从 0 开始) 的线索；`None` 表示该页不存在 (如 404)
    async fn discover(&self, page: u32) -> AppResult<Option<Vec<Lead>>>;

    async fn resolve(&self, target: &str, collection: Option<&str>) -> AppResult<Vec<DownloadItem>>;

    /// 只有一页的来源返回 `false`，引擎不会再请求第 1 页
    fn paginated(&self) -> bool {
        false
    }
}

struct CrawlState<'a, S: ?Sized> {
    source: &'a S,
    origin: &'a str,
    page: u32,
    exhausted: bool,
    leads: VecDeque<Lead>,
    pending: VecDeque<DownloadItem>,
    seen_leads: HashSet<String>,
    seen_urls: HashSet<String>,
}

/// 翻页在以下情况结束：空页、`None`、整页都是见过的线索、后续页出错。
/// 第 0 页出错时作为 `ExtractionFailure` 交给调用方。
pub(crate) fn crawl<'a, S>(source: &'a S, origin: &'a str) -> ItemStream<'a>
where
    S: PagedSource + ?Sized,
{
    let state = CrawlState {
        source,
        origin,
        page: 0,
        exhausted: false,
        leads: VecDeque::new(),
        pending: VecDeque::new(),
        seen_leads: HashSet::new(),
        seen_urls: HashSet::new(),
    };

    stream::unfold(state, |mut st| async move {
        loop {
            if let Some(item) = st.pending.pop_front() {
                if st.seen_urls.insert(item.download_url().to_string()) {
                    return Some((Ok(item), st));
                }
                debug!("跳过重复的下载链接: {}", item.download_url());
                continue;
            }

            if let Some(lead) = st.leads.pop_front() {
                match lead {
                    Lead::Ready(item) => st.pending.push_back(item),
                    Lead::Follow { target, collection } => {
                        match st.source.resolve(&target, collection.as_deref()).await {
                            Ok(items) => st.pending.extend(items),
                            Err(e) => warn!("解析 '{}' 失败，已跳过: {}", target, e),
                        }
                    }
                }
                continue;
            }

            if st.exhausted {
                return None;
            }
            let page = st.page;
            st.page += 1;
            if !st.source.paginated() {
                st.exhausted = true;
            }

            match st.source.discover(page).await {
                Ok(Some(leads)) => {
                    let total = leads.len();
                    let fresh: Vec<Lead> = leads
                        .into_iter()
                        .filter(|lead| st.seen_leads.insert(lead.key().to_string()))
                        .collect();
                    debug!("第 {} 页: {} 条线索，其中 {} 条是新的", page, total, fresh.len());
                    if fresh.is_empty() {
                        st.exhausted = true;
                    }
                    st.leads.extend(fresh);
                }
                Ok(None) => {
                    debug!("第 {} 页不存在，停止翻页", page);
                    st.exhausted = true;
                }
                Err(e) if page == 0 => {
                    st.exhausted = true;
                    return Some((Err(AppError::extraction(st.origin, e)), st));
                }
                Err(e) => {
                    warn!("获取第 {} 页失败，停止翻页: {}", page, e);
                    st.exhausted = true;
                }
            }
        }
    })
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// 用内存中的页面模拟一个来源
    struct FakeSource {
        pages: Vec<AppResult<Option<Vec<Lead>>>>,
        paginated: bool,
        discover_calls: AtomicU32,
    }

    impl FakeSource {
        fn new(pages: Vec<AppResult<Option<Vec<Lead>>>>) -> Self {
            Self {
                pages,
                paginated: true,
                discover_calls: AtomicU32::new(0),
            }
        }
    }

    fn item(url: &str) -> DownloadItem {
        DownloadItem::new(url, url.rsplit('/').next().unwrap()).unwrap()
    }

    #[async_trait]
    impl PagedSource for FakeSource {
        async fn discover(&self, page: u32) -> AppResult<Option<Vec<Lead>>> {
            self.discover_calls.fetch_add(1, Ordering::SeqCst);
            match self.pages.get(page as usize) {
                Some(Ok(leads)) => Ok(leads.clone()),
                Some(Err(_)) => Err(AppError::InvalidInput(format!("page {} broken", page))),
                None => Ok(None),
            }
        }

        async fn resolve(&self, target: &str, _collection: Option<&str>) -> AppResult<Vec<DownloadItem>> {
            if target.contains("bad") {
                return Err(AppError::InvalidInput("bad link".into()));
            }
            Ok(vec![item(&format!("https://cdn.test/{}", target))])
        }

        fn paginated(&self) -> bool {
            self.paginated
        }
    }

    #[tokio::test]
    async fn test_duplicate_links_yield_once() {
        let source = FakeSource::new(vec![Ok(Some(vec![
            Lead::follow("a.jpg", None),
            Lead::follow("a.jpg", None),
            Lead::Ready(item("https://cdn.test/a.jpg")),
            Lead::follow("b.jpg", None),
        ]))]);
        let items: Vec<_> = crawl(&source, "origin").try_collect().await.unwrap();
        let names: Vec<_> = items.iter().map(|i| i.filename()).collect();
        assert_eq!(names, vec!["a.jpg", "b.jpg"]);
    }

    #[tokio::test]
    async fn test_stops_on_empty_page_and_on_stale_page() {
        let source = FakeSource::new(vec![
            Ok(Some(vec![Lead::follow("a", None)])),
            Ok(Some(vec![])),
            Ok(Some(vec![Lead::follow("never", None)])),
        ]);
        let items: Vec<_> = crawl(&source, "origin").try_collect().await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(source.discover_calls.load(Ordering::SeqCst), 2);

        let stale = FakeSource::new(vec![
            Ok(Some(vec![Lead::follow("a", None)])),
            Ok(Some(vec![Lead::follow("a", None)])),
            Ok(Some(vec![Lead::follow("never", None)])),
        ]);
        let items: Vec<_> = crawl(&stale, "origin").try_collect().await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(stale.discover_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_first_page_error_is_extraction_failure() {
        let source = FakeSource::new(vec![Err(AppError::InvalidInput("x".into()))]);
        let err = crawl(&source, "https://site.test/a")
            .try_collect::<Vec<_>>()
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ExtractionFailure { ref url, .. } if url == "https://site.test/a"));
    }

    #[tokio::test]
    async fn test_later_page_error_keeps_earlier_items() {
        let source = FakeSource::new(vec![
            Ok(Some(vec![Lead::follow("a", None)])),
            Err(AppError::InvalidInput("x".into())),
        ]);
        let items: Vec<_> = crawl(&source, "origin").try_collect().await.unwrap();
        assert_eq!(items.len(), 1);
    }

    #[tokio::test]
    async fn test_bad_link_is_skipped() {
        let source = FakeSource::new(vec![Ok(Some(vec![
            Lead::follow("bad", None),
            Lead::follow("good", None),
        ]))]);
        let items: Vec<_> = crawl(&source, "origin").try_collect().await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].filename(), "good");
    }

    #[tokio::test]
    async fn test_nothing_is_requested_before_polling_and_after_drop() {
        let source = FakeSource::new(vec![
            Ok(Some(vec![Lead::follow("a", None), Lead::follow("b", None)])),
            Ok(Some(vec![Lead::follow("c", None)])),
        ]);
        {
            let mut stream = crawl(&source, "origin");
            assert_eq!(source.discover_calls.load(Ordering::SeqCst), 0);
            let first = stream.next().await.unwrap().unwrap();
            assert_eq!(first.filename(), "a");
        }
        assert_eq!(source.discover_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_single_page_source_does_not_paginate() {
        let mut source = FakeSource::new(vec![
            Ok(Some(vec![Lead::follow("a", None)])),
            Ok(Some(vec![Lead::follow("b", None)])),
        ]);
        source.paginated = false;
        let items: Vec<_> = crawl(&source, "origin").try_collect().await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(source.discover_calls.load(Ordering::SeqCst), 1);
    }
}
