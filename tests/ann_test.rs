//! End-to-end scenarios against the ANN engine directly (spec §8,
//! scenarios 1-3), bypassing the registry/persistence layers.

use luxdb::ann::{AnnIndex, Space};

fn vector(seed: f32, dim: usize) -> Vec<f32> {
    (0..dim).map(|i| seed + i as f32 * 0.01).collect()
}

#[test]
fn scenario_1_init_then_set_ef() {
    let mut idx = AnnIndex::new(Space::L2, 12);
    idx.init(100, 140, 12).unwrap();

    assert_eq!(idx.dim(), 12);
    assert_eq!(idx.max_elements(), 100);
    assert_eq!(idx.current_count(), 0);
    assert_eq!(idx.ef_construction(), 140);
    assert_eq!(idx.m(), 12);
    assert_eq!(idx.space(), Space::L2);

    idx.set_ef(160).unwrap();
    assert_eq!(idx.ef(), 160);
}

#[test]
fn scenario_2_resize_add_count_query() {
    let mut idx = AnnIndex::new(Space::L2, 12);
    idx.init(100, 140, 12).unwrap();
    idx.resize(200).unwrap();
    assert_eq!(idx.max_elements(), 200);

    let data: Vec<Vec<f32>> = (0..20).map(|i| vector(i as f32, 12)).collect();
    let ids: Vec<i64> = (0..20).collect();
    idx.add(&data, &ids).unwrap();
    assert_eq!(idx.current_count(), 20);

    let (labels, dists) = idx.query(&data[..5], 1).unwrap();
    for (row, label_row) in labels.iter().enumerate() {
        assert!(label_row.contains(&(row as i64)));
    }
    for row in &dists {
        assert!(row[0].abs() < 1e-3);
    }
}

#[test]
fn scenario_3_delete_item_excludes_from_future_queries() {
    let mut idx = AnnIndex::new(Space::L2, 12);
    idx.init(100, 140, 12).unwrap();
    let data: Vec<Vec<f32>> = (0..20).map(|i| vector(i as f32, 12)).collect();
    let ids: Vec<i64> = (0..20).collect();
    idx.add(&data, &ids).unwrap();

    idx.mark_deleted(0).unwrap();
    let (labels, _) = idx.query(&data, 1).unwrap();
    for row in &labels {
        assert!(!row.contains(&0));
    }
}

#[test]
fn uninitialized_index_rejects_every_operation() {
    let mut idx = AnnIndex::new(Space::Ip, 4);
    assert!(idx.set_ef(10).is_err());
    assert!(idx.add(&[vec![0.0; 4]], &[0]).is_err());
    assert!(idx.query(&[vec![0.0; 4]], 1).is_err());
    assert!(idx.resize(10).is_err());
    assert!(idx.mark_deleted(0).is_err());
    assert!(idx.get_items(&[0]).is_err());
}

#[test]
fn cosine_space_ranks_parallel_vectors_closest() {
    let mut idx = AnnIndex::new(Space::Cosine, 2);
    idx.init(10, 50, 8).unwrap();
    idx.add(&[vec![1.0, 0.0], vec![0.0, 1.0], vec![2.0, 0.0]], &[0, 1, 2]).unwrap();

    let (labels, _) = idx.query(&[vec![3.0, 0.0]], 1).unwrap();
    assert!(labels[0][0] == 0 || labels[0][0] == 2);
}
