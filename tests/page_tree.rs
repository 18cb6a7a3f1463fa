mod common;

use std::sync::Arc;

use common::{fixture, fixture_with, fixture_with_config, FailingRepository};
use pages_admin::config::PagesConfig;
use pages_admin::core::PageId;
use pages_admin::error::AppError;
use pages_admin::infrastructure::{AdminViewer, PageEvent, PagePermission};
use pages_admin::models::{OrderNode, OrderedForest, PageStatus};
use pages_admin::services::PageInput;

// Reorder

#[tokio::test]
async fn test_reorder_assigns_parents_and_sibling_order() {
    let fx = fixture().await;
    let a = fx.page("A", None).await;
    let b = fx.page("B", None).await;
    let c = fx.page("C", None).await;
    let d = fx.page("D", None).await;

    let order = OrderedForest::new(vec![
        OrderNode::with_children(c.id.0, vec![OrderNode::leaf(a.id.0), OrderNode::leaf(b.id.0)]),
        OrderNode::leaf(d.id.0),
    ]);
    fx.service.reorder(&order, &[c.id]).await.unwrap();

    let c = fx.get(c.id).await;
    assert_eq!((c.parent_id, c.order), (PageId::ROOT, 0));
    let d = fx.get(d.id).await;
    assert_eq!((d.parent_id, d.order), (PageId::ROOT, 1));

    let children = fx.children(c.id).await;
    let ids: Vec<PageId> = children.iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![a.id, b.id]);
    assert_eq!(children[0].order, 0);
    assert_eq!(children[1].order, 1);
    assert_eq!(children[0].uri, "c/a");
    assert_eq!(children[1].uri, "c/b");
}

#[tokio::test]
async fn test_reorder_detaches_pages_left_out() {
    let fx = fixture().await;
    let parent = fx.page("Parent", None).await;
    let child = fx.page("Child", Some(parent.id)).await;
    let other = fx.page("Other", None).await;

    let order = OrderedForest::new(vec![OrderNode::leaf(other.id.0)]);
    fx.service.reorder(&order, &[]).await.unwrap();

    // left-out pages follow the submitted top level in their previous order
    let top: Vec<(PageId, i64)> = fx
        .children(PageId::ROOT)
        .await
        .iter()
        .map(|p| (p.id, p.order))
        .collect();
    assert_eq!(top, vec![(other.id, 0), (parent.id, 1), (child.id, 2)]);
    assert_eq!(fx.get(child.id).await.uri, "child");
}

#[tokio::test]
async fn test_reorder_twice_is_stable() {
    let fx = fixture().await;
    let a = fx.page("A", None).await;
    let b = fx.page("B", None).await;
    let c = fx.page("C", None).await;

    let order = OrderedForest::new(vec![OrderNode::with_children(
        b.id.0,
        vec![OrderNode::with_children(a.id.0, vec![OrderNode::leaf(c.id.0)])],
    )]);
    fx.service.reorder(&order, &[b.id]).await.unwrap();
    let first = fx.all().await;
    fx.service.reorder(&order, &[b.id]).await.unwrap();
    let second = fx.all().await;

    assert_eq!(first, second);
    assert_eq!(fx.get(c.id).await.uri, "b/a/c");
}

#[tokio::test]
async fn test_empty_reorder_writes_nothing() {
    let fx = fixture().await;
    let a = fx.page("A", None).await;
    let child = fx.page("Child", Some(a.id)).await;
    let mut rx = fx.events.subscribe();

    fx.service
        .reorder(&OrderedForest::default(), &[a.id])
        .await
        .unwrap();

    assert_eq!(fx.get(child.id).await.parent_id, a.id);
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_reorder_unknown_page_changes_nothing() {
    let fx = fixture().await;
    let a = fx.page("A", None).await;
    let b = fx.page("B", Some(a.id)).await;
    let before = fx.all().await;

    let order = OrderedForest::new(vec![
        OrderNode::leaf(b.id.0),
        OrderNode::with_children(a.id.0, vec![OrderNode::leaf(999)]),
    ]);
    let err = fx.service.reorder(&order, &[]).await.unwrap_err();

    assert!(matches!(err, AppError::NotFound(_)), "got {:?}", err);
    assert!(err.to_string().contains("999"));
    assert_eq!(fx.all().await, before);
}

#[tokio::test]
async fn test_reorder_unknown_root_page_changes_nothing() {
    let fx = fixture().await;
    let a = fx.page("A", None).await;
    let before = fx.all().await;

    let order = OrderedForest::new(vec![OrderNode::leaf(a.id.0)]);
    let err = fx.service.reorder(&order, &[PageId(42)]).await.unwrap_err();

    assert!(matches!(err, AppError::NotFound(_)));
    assert_eq!(fx.all().await, before);
}

#[tokio::test]
async fn test_reorder_rejects_repeated_ids() {
    let fx = fixture().await;
    let a = fx.page("A", None).await;

    let order = OrderedForest::new(vec![OrderNode::with_children(
        a.id.0,
        vec![OrderNode::leaf(a.id.0)],
    )]);
    let err = fx.service.reorder(&order, &[]).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
}

#[tokio::test]
async fn test_reorder_failure_mid_walk_rolls_back() {
    let fx = fixture().await;
    let mut ids = Vec::new();
    for title in ["One", "Two", "Three", "Four", "Five"] {
        ids.push(fx.page(title, None).await.id);
    }
    let before = fx.all().await;

    let failing = fixture_with(
        fx.store.clone(),
        Arc::new(FailingRepository::on_update(fx.store.clone(), 3)),
    )
    .await;
    let mut rx = failing.events.subscribe();

    let order = OrderedForest::new(vec![OrderNode::with_children(
        ids[4].0,
        vec![
            OrderNode::with_children(ids[3].0, vec![OrderNode::leaf(ids[2].0)]),
            OrderNode::leaf(ids[1].0),
            OrderNode::leaf(ids[0].0),
        ],
    )]);
    let err = failing.service.reorder(&order, &[ids[4]]).await.unwrap_err();

    assert!(matches!(err, AppError::DatabaseError(_)), "got {:?}", err);
    assert_eq!(fx.all().await, before);
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_reorder_publishes_after_commit() {
    let fx = fixture().await;
    let a = fx.page("A", None).await;
    let b = fx.page("B", None).await;

    assert_eq!(fx.service.index().await.unwrap().len(), 2);
    assert_eq!(fx.cache.len().await, 1);
    let mut rx = fx.events.subscribe();

    let order = OrderedForest::new(vec![OrderNode::with_children(
        a.id.0,
        vec![OrderNode::leaf(b.id.0)],
    )]);
    fx.service.reorder(&order, &[a.id]).await.unwrap();

    assert_eq!(fx.cache.len().await, 0);
    let envelope = rx.recv().await.unwrap();
    assert_eq!(
        envelope.event,
        PageEvent::PageOrdered {
            order: order.clone(),
            root_pages: vec![a.id],
        }
    );

    let tree = fx.service.index().await.unwrap();
    assert_eq!(tree.len(), 1);
    assert_eq!(tree[0].children[0].page.id, b.id);
}

// Duplicate

#[tokio::test]
async fn test_duplicate_picks_free_title_and_slug() {
    let fx = fixture().await;
    let foo = fx.page("Foo", None).await;

    let first = fx.get(fx.service.duplicate(foo.id).await.unwrap()).await;
    assert_eq!((first.title.as_str(), first.slug.as_str()), ("Foo 2", "foo-2"));
    assert_eq!(first.uri, "foo-2");
    assert_eq!(first.order, 1);

    let second = fx.get(fx.service.duplicate(foo.id).await.unwrap()).await;
    assert_eq!((second.title.as_str(), second.slug.as_str()), ("Foo 3", "foo-3"));

    let third = fx.get(fx.service.duplicate(first.id).await.unwrap()).await;
    assert_eq!((third.title.as_str(), third.slug.as_str()), ("Foo 4", "foo-4"));

    let mut slugs: Vec<String> = fx.children(PageId::ROOT).await.into_iter().map(|p| p.slug).collect();
    slugs.sort();
    slugs.dedup();
    assert_eq!(slugs.len(), 4);
}

#[tokio::test]
async fn test_duplicate_copies_subtree() {
    let fx = fixture().await;
    let root = fx.page("Docs", None).await;
    let guide = fx.page("Guide", Some(root.id)).await;
    let step = fx.page("Step", Some(guide.id)).await;
    let faq = fx.page("FAQ", Some(root.id)).await;

    let copy_id = fx.service.duplicate(root.id).await.unwrap();
    let copy = fx.get(copy_id).await;
    assert_eq!(copy.slug, "docs-2");
    assert_eq!(copy.parent_id, PageId::ROOT);

    let children = fx.children(copy_id).await;
    let slugs: Vec<&str> = children.iter().map(|p| p.slug.as_str()).collect();
    assert_eq!(slugs, vec!["guide", "faq"]);
    assert!(children.iter().all(|p| p.id != guide.id && p.id != faq.id));

    let grandchildren = fx.children(children[0].id).await;
    assert_eq!(grandchildren.len(), 1);
    assert_eq!(grandchildren[0].title, "Step");
    assert_eq!(grandchildren[0].uri, "docs-2/guide/step");

    // source tree untouched
    assert_eq!(fx.get(step.id).await.uri, "docs/guide/step");
    assert_eq!(fx.children(root.id).await.len(), 2);
    assert_eq!(fx.all().await.len(), 8);
}

#[tokio::test]
async fn test_duplicate_drops_restrictions_and_home() {
    let fx = fixture().await;
    let page = fx
        .service
        .create(
            &AdminViewer::admin(),
            PageInput {
                title: "Members".to_string(),
                type_id: Some(fx.type_id),
                restricted_to: Some(vec![3, 5]),
                is_home: true,
                meta_title: Some("Members area".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(page.restricted_to, Some(vec![3, 5]));

    let copy = fx.get(fx.service.duplicate(page.id).await.unwrap()).await;
    assert_eq!(copy.restricted_to, None);
    assert!(!copy.is_home);
    assert_eq!(copy.meta_title.as_deref(), Some("Members area"));
    assert!(fx.get(page.id).await.is_home);
}

#[tokio::test]
async fn test_duplicate_failure_deep_in_subtree_rolls_back() {
    let fx = fixture().await;
    let root = fx.page("Docs", None).await;
    let guide = fx.page("Guide", Some(root.id)).await;
    fx.page("Step", Some(guide.id)).await;
    let before = fx.all().await;

    // copies are created top down, so the third insert is the grandchild
    let failing = fixture_with(
        fx.store.clone(),
        Arc::new(FailingRepository::on_create(fx.store.clone(), 3)),
    )
    .await;
    let mut rx = failing.events.subscribe();

    let err = failing.service.duplicate(root.id).await.unwrap_err();

    assert!(matches!(err, AppError::DatabaseError(_)), "got {:?}", err);
    assert_eq!(fx.all().await, before);
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_duplicate_rejects_subtree_deeper_than_limit() {
    let fx = fixture().await;
    let root = fx.page("Docs", None).await;
    let guide = fx.page("Guide", Some(root.id)).await;
    fx.page("Step", Some(guide.id)).await;
    let before = fx.all().await;

    let shallow = fixture_with_config(
        fx.store.clone(),
        fx.store.clone(),
        PagesConfig {
            max_tree_depth: 2,
            ..PagesConfig::default()
        },
    )
    .await;

    let err = shallow.service.duplicate(root.id).await.unwrap_err();

    assert!(matches!(err, AppError::Validation(_)), "got {:?}", err);
    assert_eq!(fx.all().await, before);
}

#[tokio::test]
async fn test_positions_stay_unique_after_delete() {
    let fx = fixture().await;
    let a = fx.page("A", None).await;
    let b = fx.page("B", None).await;
    fx.page("C", None).await;

    fx.service.delete(&AdminViewer::admin(), &[b.id]).await.unwrap();
    let d = fx.page("D", None).await;
    let copy = fx.service.duplicate(a.id).await.unwrap();
    assert_eq!(fx.get(d.id).await.order, 3);
    assert_eq!(fx.get(copy).await.order, 4);

    // moving a page into a parent with a gap appends it too
    let parent = fx.page("Parent", None).await;
    let first = fx.page("First", Some(parent.id)).await;
    let second = fx.page("Second", Some(parent.id)).await;
    fx.service.delete(&AdminViewer::admin(), &[first.id]).await.unwrap();
    let moved = fx
        .service
        .update(
            &AdminViewer::admin(),
            d.id,
            PageInput {
                title: "D".to_string(),
                parent_id: Some(parent.id),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(fx.get(second.id).await.order, 1);
    assert_eq!(moved.order, 2);

    for group in [PageId::ROOT, parent.id] {
        let mut orders: Vec<i64> = fx.children(group).await.iter().map(|p| p.order).collect();
        let count = orders.len();
        orders.dedup();
        assert_eq!(orders.len(), count, "duplicate order under {}", group);
    }
}

#[tokio::test]
async fn test_duplicate_missing_page() {
    let fx = fixture().await;
    let mut rx = fx.events.subscribe();

    let err = fx.service.duplicate(PageId(77)).await.unwrap_err();

    assert!(matches!(err, AppError::NotFound(_)));
    assert!(fx.all().await.is_empty());
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_duplicate_emits_event() {
    let fx = fixture().await;
    let page = fx.page("Foo", None).await;
    let mut rx = fx.events.subscribe();

    let copy = fx.service.duplicate(page.id).await.unwrap();

    let envelope = rx.recv().await.unwrap();
    assert_eq!(
        envelope.event,
        PageEvent::PageDuplicated {
            source: page.id,
            copy,
        }
    );
}

// Create, edit, delete

#[tokio::test]
async fn test_create_derives_slug_and_uri() {
    let fx = fixture().await;
    let parent = fx.page("About Us", None).await;
    let child = fx.page("Our Team!", Some(parent.id)).await;

    assert_eq!(parent.slug, "about-us");
    assert_eq!(child.uri, "about-us/our-team");
    assert_eq!(child.status, PageStatus::Draft);
}

#[tokio::test]
async fn test_create_asks_for_slug_when_title_has_none() {
    let fx = fixture().await;
    let input = PageInput {
        title: "日本語".to_string(),
        type_id: Some(fx.type_id),
        ..Default::default()
    };

    let err = fx
        .service
        .create(&AdminViewer::admin(), input.clone())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
    assert!(err.to_string().contains("provide a slug"), "got {}", err);

    let page = fx
        .service
        .create(
            &AdminViewer::admin(),
            PageInput {
                slug: Some("nihongo".to_string()),
                ..input
            },
        )
        .await
        .unwrap();
    assert_eq!(page.title, "日本語");
    assert_eq!(page.uri, "nihongo");
}

#[tokio::test]
async fn test_create_rejects_sibling_slug() {
    let fx = fixture().await;
    let parent = fx.page("Blog", None).await;
    fx.page("News", Some(parent.id)).await;
    // same slug under another parent is fine
    fx.page("News", None).await;

    let err = fx
        .service
        .create(
            &AdminViewer::admin(),
            PageInput {
                title: "News".to_string(),
                parent_id: Some(parent.id),
                type_id: Some(fx.type_id),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::SlugConflict(_)));
}

#[tokio::test]
async fn test_create_requires_known_type_and_parent() {
    let fx = fixture().await;
    let viewer = AdminViewer::admin();

    let err = fx
        .service
        .create(
            &viewer,
            PageInput {
                title: "Lost".to_string(),
                type_id: Some(pages_admin::core::PageTypeId(99)),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let err = fx
        .service
        .create(
            &viewer,
            PageInput {
                title: "Orphan".to_string(),
                parent_id: Some(PageId(12)),
                type_id: Some(fx.type_id),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_live_pages_need_put_live() {
    let fx = fixture().await;
    let input = PageInput {
        title: "Launch".to_string(),
        type_id: Some(fx.type_id),
        status: Some(PageStatus::Live),
        ..Default::default()
    };

    let err = fx
        .service
        .create(&AdminViewer::with_permissions([PagePermission::EditLive]), input.clone())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    let page = fx
        .service
        .create(&AdminViewer::with_permissions([PagePermission::PutLive]), input)
        .await
        .unwrap();
    assert_eq!(page.status, PageStatus::Live);
}

#[tokio::test]
async fn test_update_moves_page_and_rebuilds_uri() {
    let fx = fixture().await;
    let a = fx.page("A", None).await;
    let b = fx.page("B", None).await;
    let leaf = fx.page("Leaf", Some(b.id)).await;

    let moved = fx
        .service
        .update(
            &AdminViewer::admin(),
            b.id,
            PageInput {
                title: "B".to_string(),
                slug: Some("bee".to_string()),
                parent_id: Some(a.id),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(moved.parent_id, a.id);
    assert_eq!(moved.uri, "a/bee");
    assert!(moved.updated_on.is_some());
    assert_eq!(fx.get(leaf.id).await.uri, "a/bee/leaf");
}

#[tokio::test]
async fn test_update_refuses_cycles_and_missing_permission() {
    let fx = fixture().await;
    let a = fx.page("A", None).await;
    let b = fx.page("B", Some(a.id)).await;

    let err = fx
        .service
        .update(
            &AdminViewer::admin(),
            a.id,
            PageInput {
                title: "A".to_string(),
                parent_id: Some(b.id),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let err = fx
        .service
        .update(
            &AdminViewer::default(),
            a.id,
            PageInput {
                title: "Renamed".to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));
    assert_eq!(fx.get(a.id).await.title, "A");
}

#[tokio::test]
async fn test_delete_removes_subtree() {
    let fx = fixture().await;
    let a = fx.page("A", None).await;
    let b = fx.page("B", Some(a.id)).await;
    let c = fx.page("C", Some(b.id)).await;
    let keep = fx.page("Keep", None).await;
    let mut rx = fx.events.subscribe();

    let outcome = fx
        .service
        .delete(&AdminViewer::admin(), &[a.id, PageId(500)])
        .await
        .unwrap();

    assert_eq!(outcome.deleted, vec![a.id, b.id, c.id]);
    assert_eq!(outcome.missing, vec![PageId(500)]);
    let remaining: Vec<PageId> = fx.all().await.iter().map(|p| p.id).collect();
    assert_eq!(remaining, vec![keep.id]);

    let envelope = rx.recv().await.unwrap();
    assert_eq!(envelope.event, PageEvent::PageDeleted(vec![a.id, b.id, c.id]));
}

#[tokio::test]
async fn test_delete_never_removes_home() {
    let fx = fixture().await;
    let section = fx.page("Section", None).await;
    let home = fx
        .service
        .create(
            &AdminViewer::admin(),
            PageInput {
                title: "Home".to_string(),
                parent_id: Some(section.id),
                type_id: Some(fx.type_id),
                is_home: true,
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let outcome = fx
        .service
        .delete(&AdminViewer::admin(), &[home.id, section.id])
        .await
        .unwrap();

    assert!(outcome.deleted.is_empty());
    assert_eq!(outcome.refused_home, vec![home.id, section.id]);
    assert_eq!(fx.all().await.len(), 2);

    let err = fx
        .service
        .delete(&AdminViewer::with_permissions([PagePermission::EditLive]), &[section.id])
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));
}

#[tokio::test]
async fn test_new_home_replaces_old() {
    let fx = fixture().await;
    let viewer = AdminViewer::admin();
    let home_input = |title: &str| PageInput {
        title: title.to_string(),
        type_id: Some(fx.type_id),
        is_home: true,
        ..Default::default()
    };

    let first = fx.service.create(&viewer, home_input("First")).await.unwrap();
    let second = fx.service.create(&viewer, home_input("Second")).await.unwrap();

    assert!(!fx.get(first.id).await.is_home);
    assert!(fx.get(second.id).await.is_home);
}

#[tokio::test]
async fn test_choose_type_direct_when_single() {
    let fx = fixture().await;
    let choice = fx.service.choose_type().await.unwrap();
    assert_eq!(choice.direct, Some(fx.type_id));

    fx.service.create_page_type("Gallery", "Images").await.unwrap();
    let choice = fx.service.choose_type().await.unwrap();
    assert_eq!(choice.types.len(), 2);
    assert_eq!(choice.direct, None);
}

#[tokio::test]
async fn test_seed_default_type_only_when_empty() {
    let fx = fixture().await;
    fx.service.seed_default_type().await.unwrap();
    assert_eq!(fx.service.choose_type().await.unwrap().types.len(), 1);
}
