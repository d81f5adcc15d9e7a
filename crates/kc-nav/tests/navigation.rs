//! Folder navigation behavior through the public interface

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use kc_nav::{BACK_ID, DirtySignal, Folder, FolderBase, Item, RowItem, SnapshotSource};

fn rows_of(ids: &[&str]) -> Vec<Arc<dyn Item>> {
    ids.iter()
        .map(|id| Arc::new(RowItem::new(*id, vec![id.to_string()])) as Arc<dyn Item>)
        .collect()
}

fn static_folder(path: &[&str], ids: &[&str]) -> FolderBase {
    let rows = rows_of(ids);
    let source = SnapshotSource::new(Arc::new(move || {
        let rows = rows.clone();
        Box::pin(async move { Ok(rows) })
    }));
    FolderBase::new(
        vec!["Name".to_string()],
        path.iter().map(|s| s.to_string()).collect(),
        Arc::new(source),
    )
}

fn ids(rows: &[Arc<dyn Item>]) -> Vec<String> {
    rows.iter().map(|r| r.id().to_string()).collect()
}

#[tokio::test]
async fn test_window_reads_reconstruct_the_full_listing() {
    let folder = static_folder(&["namespaces", "testns"], &["a", "b", "c", "d", "e"]);
    let len = folder.len().await.unwrap();
    assert_eq!(len, 6);

    // any (top, num) window equals the slice of the full listing
    let all = folder.lines(0, len).await.unwrap();
    for top in 0..=len + 1 {
        for num in 0..=len + 1 {
            let window = folder.lines(top, num).await.unwrap();
            let expect: Vec<String> = all
                .iter()
                .skip(top)
                .take(num)
                .map(|r| r.id().to_string())
                .collect();
            assert_eq!(ids(&window), expect, "window top={top} num={num}");
        }
    }

    // find is consistent with lines for every row
    for (idx, row) in all.iter().enumerate() {
        let (found_idx, found) = folder.find(row.id()).await.unwrap().unwrap();
        assert_eq!(found_idx, idx);
        assert_eq!(found.id(), row.id());
    }
}

#[tokio::test]
async fn test_above_anchor_below_recover_a_contiguous_range() {
    let folder = static_folder(&["x"], &["a", "b", "c", "d", "e"]);

    for anchor in ["a", "b", "c", "d", "e"] {
        for n in 0..4 {
            let above = folder.above(anchor, n).await.unwrap();
            let below = folder.below(anchor, n).await.unwrap();
            let (idx, _) = folder.find(anchor).await.unwrap().unwrap();

            // windows are disjoint and adjacent to the anchor
            let mut combined = ids(&above);
            combined.push(anchor.to_string());
            combined.extend(ids(&below));

            let len = folder.len().await.unwrap();
            let start = idx.saturating_sub(n);
            let end = (idx + 1 + n).min(len);
            let expect = ids(&folder.lines(start, end - start).await.unwrap());
            assert_eq!(combined, expect, "anchor={anchor} n={n}");
        }
    }
}

#[tokio::test]
async fn test_back_row_exists_even_for_empty_sources() {
    let folder = static_folder(&["namespaces", "empty"], &[]);

    assert_eq!(folder.len().await.unwrap(), 1);
    let (idx, back) = folder.find(BACK_ID).await.unwrap().unwrap();
    assert_eq!(idx, 0);
    assert!(back.is_back());
    assert_eq!(ids(&folder.lines(0, 10).await.unwrap()), [BACK_ID]);
}

#[tokio::test]
async fn test_informer_style_dirty_coalesces_into_one_repopulate() {
    let populates = Arc::new(AtomicUsize::new(0));
    let signal = DirtySignal::new();
    let source = {
        let populates = populates.clone();
        SnapshotSource::with_signal(
            Arc::new(move || {
                populates.fetch_add(1, Ordering::SeqCst);
                Box::pin(async move {
                    Ok(vec![
                        Arc::new(RowItem::new("a", vec!["a".to_string()])) as Arc<dyn Item>
                    ])
                })
            }),
            signal.clone(),
        )
    };
    let folder = FolderBase::new(
        vec!["Name".to_string()],
        vec!["pods".to_string()],
        Arc::new(source),
    );

    let repaints = Arc::new(AtomicUsize::new(0));
    folder.set_dirty_notifier(Arc::new({
        let repaints = repaints.clone();
        move || {
            repaints.fetch_add(1, Ordering::SeqCst);
        }
    }));

    folder.lines(0, 5).await.unwrap();
    assert_eq!(populates.load(Ordering::SeqCst), 1);

    // three informer events before the next read: one notification each,
    // but a single repopulate
    signal.mark();
    signal.mark();
    signal.mark();
    assert!(folder.is_dirty());
    assert_eq!(repaints.load(Ordering::SeqCst), 3);

    folder.lines(0, 5).await.unwrap();
    assert_eq!(populates.load(Ordering::SeqCst), 2);
    assert!(!folder.is_dirty());

    folder.lines(0, 5).await.unwrap();
    assert_eq!(populates.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_item_by_id_only_returns_navigation_items() {
    // a plain row and an enterable one
    let plain = Arc::new(RowItem::new("plain", vec!["plain".to_string()])) as Arc<dyn Item>;
    let enterable = Arc::new(
        RowItem::new("folderish", vec!["folderish".to_string()]).with_enter(Arc::new(|| {
            Box::pin(async {
                Err(kc_nav::NavError::NotEnterable {
                    id: "folderish".to_string(),
                })
            })
        })),
    ) as Arc<dyn Item>;

    let rows = vec![plain, enterable];
    let source = SnapshotSource::new(Arc::new(move || {
        let rows = rows.clone();
        Box::pin(async move { Ok(rows) })
    }));
    let folder = FolderBase::new(
        vec!["Name".to_string()],
        vec!["x".to_string()],
        Arc::new(source),
    );

    assert!(folder.item_by_id("plain").await.unwrap().is_none());
    assert!(folder.item_by_id("folderish").await.unwrap().is_some());
    // find still returns both
    assert!(folder.find("plain").await.unwrap().is_some());
    // and the back row is always an item
    assert!(folder.item_by_id(BACK_ID).await.unwrap().is_some());
}
