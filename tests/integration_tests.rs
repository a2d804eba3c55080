//! Integration tests for trueno-graph-dist
//!
//! Multi-rank scenarios over the in-process process group: every test spawns
//! one tokio task per rank and compares against a single-process reference.

use std::sync::Arc;
use trueno_graph_dist::{
    bfs, multi_source_bfs, pagerank, BfsConfig, GraphError, LocalGraph, LocalProcessGroup,
    PageRankConfig, Personalization, VertexPartition,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Reference graph: 32 vertices, rank 0 owns [0, 13) with 62 local edges,
/// rank 1 owns [13, 32) with 64. Vertices 30 and 31 have no out-edges.
fn reference_slices() -> [Vec<(u32, u32)>; 2] {
    let rank0 = (0..62).map(|i| ((i * 7 + 3) % 30, (i * 5) % 13)).collect();
    let rank1 = (0..64).map(|i| ((i * 11 + 1) % 29, 13 + (i * 3) % 19)).collect();
    [rank0, rank1]
}

/// Single-process power iteration with uniform restart and dangling mass
/// spread uniformly
#[allow(clippy::cast_precision_loss)]
fn reference_pagerank(
    n: usize,
    edges: &[(u32, u32)],
    damping: f64,
    iterations: usize,
) -> Vec<f64> {
    let mut degree = vec![0_usize; n];
    for &(src, _) in edges {
        degree[src as usize] += 1;
    }

    let uniform = 1.0 / n as f64;
    let mut scores = vec![uniform; n];
    for _ in 0..iterations {
        let dangling: f64 = (0..n).filter(|&v| degree[v] == 0).map(|v| scores[v]).sum();
        let mut next = vec![0.0; n];
        for &(src, dst) in edges {
            next[dst as usize] += scores[src as usize] / degree[src as usize] as f64;
        }
        for value in &mut next {
            *value = (1.0 - damping) * uniform + damping * (*value + dangling * uniform);
        }
        scores = next;
    }
    scores
}

/// Sequential BFS: distance and lowest-id discoverer per vertex
fn reference_bfs(n: usize, edges: &[(u32, u32)], sources: &[u32]) -> (Vec<u32>, Vec<u32>) {
    let mut distance = vec![u32::MAX; n];
    let mut predecessor = vec![u32::MAX; n];
    let mut frontier: Vec<u32> = sources.to_vec();
    for &s in sources {
        distance[s as usize] = 0;
    }

    let mut depth = 0;
    while !frontier.is_empty() {
        depth += 1;
        let mut next = Vec::new();
        for &(src, dst) in edges {
            if frontier.contains(&src) {
                let d = dst as usize;
                if distance[d] == u32::MAX {
                    distance[d] = depth;
                    predecessor[d] = src;
                    next.push(dst);
                } else if distance[d] == depth {
                    predecessor[d] = predecessor[d].min(src);
                }
            }
        }
        frontier = next;
    }
    (distance, predecessor)
}

/// Deterministic pseudo-random edge list
fn scrambled_edges(n: u32, count: u32, seed: u32) -> Vec<(u32, u32)> {
    (0..count)
        .map(|i| {
            let a = i.wrapping_mul(2_654_435_761).wrapping_add(seed);
            let b = a.rotate_left(13).wrapping_mul(40_503).wrapping_add(seed);
            (a % n, b % n)
        })
        .collect()
}

async fn run_bfs(
    edges: Arc<Vec<(u32, u32)>>,
    n: usize,
    ranks: usize,
    sources: Arc<Vec<u32>>,
) -> (Vec<u32>, Vec<u32>) {
    let results = LocalProcessGroup::run(ranks, move |comm| {
        let edges = Arc::clone(&edges);
        let sources = Arc::clone(&sources);
        async move {
            let partition = VertexPartition::uniform(n, comm.size(), comm.rank())?;
            let graph =
                LocalGraph::split_by_destination(&edges, &partition)?.swap_remove(comm.rank());
            let config = BfsConfig::default().with_expensive_check(true);
            if sources.len() > 1 {
                multi_source_bfs(&comm, &partition, &graph, &sources, &config).await
            } else {
                bfs(&comm, &partition, &graph, sources[0], &config).await
            }
        }
    })
    .await
    .unwrap();

    let distances = results.iter().flat_map(|r| r.distances.clone()).collect();
    let predecessors = results.iter().flat_map(|r| r.predecessors.clone()).collect();
    (distances, predecessors)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_reference_scenario_matches_single_process() {
    init_tracing();
    let slices = Arc::new(reference_slices());
    assert_eq!(slices[0].len(), 62);
    assert_eq!(slices[1].len(), 64);

    let results = LocalProcessGroup::run(2, move |comm| {
        let slices = Arc::clone(&slices);
        async move {
            let graph = LocalGraph::from_edges(&slices[comm.rank()])?;
            // Ranges derived from the destination span of each slice
            let (first, last) = graph.destination_span().unwrap_or_default();
            let bound = graph.id_bound().unwrap_or_default();
            let partition = VertexPartition::from_local_range(&comm, first, last, bound).await?;
            assert_eq!(partition.offsets(), &[0, 13, 32]);

            let config = PageRankConfig::default()
                .with_max_iterations(30)
                .with_expensive_check(true);
            let result = pagerank::<_, _, f64>(&comm, &partition, &graph, &config, None).await?;
            let scores: Vec<(u32, f64)> = result.iter_global(&partition).collect();
            Ok((scores, result.mass_history))
        }
    })
    .await
    .unwrap();

    let all_edges: Vec<(u32, u32)> = reference_slices().concat();
    let expected = reference_pagerank(32, &all_edges, 0.85, 30);

    let mut seen = 0;
    for (scores, mass_history) in results {
        assert_eq!(mass_history.len(), 30);
        for mass in mass_history {
            assert!((mass - 1.0).abs() < 1e-5, "mass = {mass}");
        }
        for (vertex, score) in scores {
            let want = expected[vertex as usize];
            assert!(
                (score - want).abs() < 1e-6,
                "vertex {vertex}: got {score}, want {want}"
            );
            seen += 1;
        }
    }
    assert_eq!(seen, 32);
}

#[tokio::test]
async fn test_ingested_partition_covers_source_only_vertex() {
    // Vertex 3 is never a destination, so no slice's span reaches it
    let slices = Arc::new(vec![vec![(3_u32, 0_u32), (2, 1)], vec![(0, 2), (1, 2)]]);

    let results = LocalProcessGroup::run(2, move |comm| {
        let slices = Arc::clone(&slices);
        async move {
            let graph = LocalGraph::from_edges(&slices[comm.rank()])?;
            let (first, last) = graph.destination_span().unwrap_or_default();
            let bound = graph.id_bound().unwrap_or_default();
            let partition = VertexPartition::from_local_range(&comm, first, last, bound).await?;
            assert_eq!(partition.offsets(), &[0, 2, 4]);

            let config = PageRankConfig::default()
                .with_max_iterations(20)
                .with_expensive_check(true);
            let result = pagerank::<_, _, f64>(&comm, &partition, &graph, &config, None).await?;
            Ok(result.iter_global(&partition).collect::<Vec<(u32, f64)>>())
        }
    })
    .await
    .unwrap();

    let all_edges: Vec<(u32, u32)> = [(3, 0), (2, 1), (0, 2), (1, 2)].to_vec();
    let expected = reference_pagerank(4, &all_edges, 0.85, 20);
    let scores: Vec<(u32, f64)> = results.concat();
    assert_eq!(scores.len(), 4);
    for (vertex, score) in scores {
        let want = expected[vertex as usize];
        assert!(
            (score - want).abs() < 1e-6,
            "vertex {vertex}: got {score}, want {want}"
        );
    }
}

#[tokio::test]
async fn test_pagerank_independent_of_rank_count() {
    let edges = Arc::new(scrambled_edges(40, 160, 7));
    let mut per_rank_count = Vec::new();

    for ranks in [1, 2, 3, 5] {
        let edges = Arc::clone(&edges);
        let results = LocalProcessGroup::run(ranks, move |comm| {
            let edges = Arc::clone(&edges);
            async move {
                let partition = VertexPartition::<u32>::uniform(40, comm.size(), comm.rank())?;
                let graph =
                    LocalGraph::split_by_destination(&edges, &partition)?.swap_remove(comm.rank());
                pagerank::<_, _, f64>(&comm, &partition, &graph, &PageRankConfig::default(), None)
                    .await
            }
        })
        .await
        .unwrap();
        per_rank_count.push(results.into_iter().flat_map(|r| r.scores).collect::<Vec<_>>());
    }

    let single = &per_rank_count[0];
    for scores in &per_rank_count[1..] {
        for (a, b) in single.iter().zip(scores) {
            assert!((a - b).abs() < 1e-12, "{a} vs {b}");
        }
    }
}

#[tokio::test]
async fn test_pagerank_rerun_is_identical() {
    let edges = Arc::new(scrambled_edges(25, 90, 3));
    let mut runs = Vec::new();
    for _ in 0..3 {
        let edges = Arc::clone(&edges);
        let results = LocalProcessGroup::run(3, move |comm| {
            let edges = Arc::clone(&edges);
            async move {
                let partition = VertexPartition::<u32>::uniform(25, comm.size(), comm.rank())?;
                let graph =
                    LocalGraph::split_by_destination(&edges, &partition)?.swap_remove(comm.rank());
                let personalization =
                    Personalization::new(vec![0, 5, 24], vec![1.0_f32, 2.0, 1.0])?;
                pagerank(
                    &comm,
                    &partition,
                    &graph,
                    &PageRankConfig::default().with_max_iterations(20),
                    Some(personalization),
                )
                .await
            }
        })
        .await
        .unwrap();
        runs.push(results);
    }

    assert_eq!(runs[0], runs[1]);
    assert_eq!(runs[1], runs[2]);
}

#[tokio::test]
async fn test_bfs_matches_sequential_reference() {
    init_tracing();
    let edges = Arc::new(scrambled_edges(60, 150, 11));
    let sources = Arc::new(vec![0]);
    let expected = reference_bfs(60, &edges, &sources);

    for ranks in [1, 2, 4, 7] {
        let got = run_bfs(Arc::clone(&edges), 60, ranks, Arc::clone(&sources)).await;
        assert_eq!(got, expected, "{ranks} ranks");
    }
}

#[tokio::test]
async fn test_multi_source_bfs_matches_reference() {
    let edges = Arc::new(scrambled_edges(50, 80, 5));
    let sources = Arc::new(vec![3, 17, 41]);
    let expected = reference_bfs(50, &edges, &sources);

    let got = run_bfs(edges, 50, 3, sources).await;
    assert_eq!(got, expected);
}

#[tokio::test]
async fn test_multi_source_requires_several_sources() {
    let result = LocalProcessGroup::run(2, |comm| async move {
        let partition = VertexPartition::<u32>::uniform(8, comm.size(), comm.rank())?;
        let graph = LocalGraph::split_by_destination(&[(0, 1), (1, 7)], &partition)?
            .swap_remove(comm.rank());
        multi_source_bfs(&comm, &partition, &graph, &[0], &BfsConfig::default()).await
    })
    .await;

    assert!(matches!(result, Err(GraphError::InvalidArgument(_))));
}

#[tokio::test]
async fn test_out_of_space_edge_aborts_every_rank() {
    // Rank 1 holds an edge into vertex 40 of a 32-vertex graph.
    let results = LocalProcessGroup::run_each(2, |comm| async move {
        let partition = VertexPartition::<u32>::from_offsets(vec![0, 13, 32], comm.rank())?;
        let graph = if comm.rank() == 0 {
            LocalGraph::from_edges(&[(20, 1), (0, 2)])?
        } else {
            LocalGraph::from_edges(&[(0, 20), (2, 40)])?
        };
        pagerank::<_, _, f64>(&comm, &partition, &graph, &PageRankConfig::default(), None).await
    })
    .await;

    for result in results {
        assert_eq!(
            result.unwrap_err(),
            GraphError::ConfigurationMismatch {
                vertex: 40,
                detected_by: 1
            }
        );
    }
}

#[tokio::test]
async fn test_misplaced_edge_aborts_every_rank() {
    init_tracing();
    let results = LocalProcessGroup::run_each(3, |comm| async move {
        let partition = VertexPartition::<u64>::uniform(9, comm.size(), comm.rank())?;
        // Rank 2 stores 4 → 1, but vertex 1 belongs to rank 0.
        let edges: &[(u64, u64)] = match comm.rank() {
            0 => &[(8, 0)],
            1 => &[(0, 3)],
            _ => &[(3, 6), (4, 1)],
        };
        let graph = LocalGraph::from_edges(edges)?;
        let config = BfsConfig::default().with_expensive_check(true);
        bfs(&comm, &partition, &graph, 0, &config).await
    })
    .await;

    for result in results {
        assert_eq!(
            result.unwrap_err(),
            GraphError::ConfigurationMismatch {
                vertex: 1,
                detected_by: 2
            }
        );
    }
}

#[tokio::test]
async fn test_divergent_views_abort_every_rank_without_check() {
    init_tracing();
    let results = LocalProcessGroup::run_each(2, |comm| async move {
        // The ranks disagree on the boundary; vertex 4 is claimed by neither.
        let offsets = if comm.rank() == 0 { vec![0_u32, 4, 8] } else { vec![0, 6, 8] };
        let partition = VertexPartition::from_offsets(offsets, comm.rank())?;
        let edges: &[(u32, u32)] = if comm.rank() == 0 { &[(0, 4)] } else { &[] };
        let graph = LocalGraph::from_edges(edges)?;
        bfs(&comm, &partition, &graph, 0, &BfsConfig::default()).await
    })
    .await;

    assert_eq!(results.len(), 2);
    for result in results {
        assert_eq!(
            result.unwrap_err(),
            GraphError::ConfigurationMismatch {
                vertex: 4,
                detected_by: 1
            }
        );
    }
}

#[cfg(feature = "storage")]
#[tokio::test]
async fn test_parquet_slices_feed_bfs() {
    use tempfile::tempdir;

    let dir = Arc::new(tempdir().unwrap());
    let edges = Arc::new(scrambled_edges(30, 70, 2));

    // Ingestion: split and persist one file per rank
    let writer = VertexPartition::<u32>::uniform(30, 3, 0).unwrap();
    for (rank, slice) in LocalGraph::split_by_destination(&edges, &writer)
        .unwrap()
        .into_iter()
        .enumerate()
    {
        slice
            .write_parquet(dir.path().join(format!("rank{rank}.parquet")))
            .await
            .unwrap();
    }

    let reader_dir = Arc::clone(&dir);
    let results = LocalProcessGroup::run(3, move |comm| {
        let dir = Arc::clone(&reader_dir);
        async move {
            let path = dir.path().join(format!("rank{}.parquet", comm.rank()));
            let graph = LocalGraph::<u32>::read_parquet(path)
                .await
                .map_err(|e| GraphError::invalid_argument(e.to_string()))?;
            let partition = VertexPartition::uniform(30, comm.size(), comm.rank())?;
            bfs(&comm, &partition, &graph, 0, &BfsConfig::default()).await
        }
    })
    .await
    .unwrap();

    let distances: Vec<u32> = results.iter().flat_map(|r| r.distances.clone()).collect();
    assert_eq!(distances, reference_bfs(30, &edges, &[0]).0);
}
