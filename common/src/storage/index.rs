use std::{
    fs::File,
    io::{BufReader, BufWriter, Read, Write},
    path::Path,
};

use crate::error::AppError;

/// Below this corpus size an exhaustive flat index is built; exact search is
/// cheap at that scale and guarantees true nearest neighbors.
pub const FLAT_INDEX_THRESHOLD: usize = 100;
/// Upper bound on k-means cluster count for the inverted-list index.
pub const MAX_CLUSTERS: usize = 100;
/// Clusters probed per query on the inverted-list index.
pub const DEFAULT_NPROBE: usize = 1;

const KMEANS_ITERATIONS: usize = 10;
const INDEX_MAGIC: [u8; 4] = *b"GVIX";
const INDEX_FORMAT_VERSION: u32 = 1;

const KIND_FLAT: u8 = 0;
const KIND_IVF: u8 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKind {
    Flat,
    Ivf,
}

/// Nearest-neighbor index over fixed-dimension vectors.
///
/// The structure is chosen once at build time from the size of the first
/// batch: small corpora get an exhaustive flat scan, larger ones a k-means
/// clustered inverted-list layout. The index is append-only after creation;
/// later adds assign to the nearest existing centroid without re-clustering,
/// an accepted staleness trade-off.
///
/// Distances are squared Euclidean, returned ascending.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    dim: usize,
    /// All vectors in global insertion order, row-major.
    data: Vec<f32>,
    clusters: Option<Clusters>,
}

#[derive(Debug, Clone)]
struct Clusters {
    /// `nlist` centroid rows, row-major.
    centroids: Vec<f32>,
    /// Vector positions per centroid.
    lists: Vec<Vec<u32>>,
    nprobe: usize,
}

impl VectorIndex {
    /// Builds an index from the initial embedding batch, applying the
    /// size-based structure policy.
    pub fn build(vectors: &[Vec<f32>]) -> Result<Self, AppError> {
        let dim = vectors
            .first()
            .map(Vec::len)
            .filter(|len| *len > 0)
            .ok_or_else(|| {
                AppError::Validation("cannot build an index from zero vectors".into())
            })?;

        let data = flatten_checked(vectors, dim)?;
        let count = vectors.len();

        let clusters = if count < FLAT_INDEX_THRESHOLD {
            None
        } else {
            let nlist = cluster_count(count);
            let centroids = kmeans(&data, dim, nlist);
            let mut lists = vec![Vec::new(); nlist];
            for (position, vector) in data.chunks_exact(dim).enumerate() {
                let centroid = nearest_centroid(&centroids, dim, vector);
                let id = position_id(position)?;
                if let Some(list) = lists.get_mut(centroid) {
                    list.push(id);
                }
            }
            Some(Clusters {
                centroids,
                lists,
                nprobe: DEFAULT_NPROBE,
            })
        };

        Ok(Self {
            dim,
            data,
            clusters,
        })
    }

    /// Appends vectors without retraining; clustered indexes assign each new
    /// vector to its nearest existing centroid.
    pub fn add(&mut self, vectors: &[Vec<f32>]) -> Result<(), AppError> {
        let added = flatten_checked(vectors, self.dim)?;

        if let Some(clusters) = &mut self.clusters {
            let mut position = self.data.len() / self.dim;
            for vector in added.chunks_exact(self.dim) {
                let centroid = nearest_centroid(&clusters.centroids, self.dim, vector);
                let id = position_id(position)?;
                if let Some(list) = clusters.lists.get_mut(centroid) {
                    list.push(id);
                }
                position += 1;
            }
        }

        self.data.extend_from_slice(&added);
        Ok(())
    }

    /// Returns up to `k` `(position, distance)` pairs ascending by distance.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(usize, f32)>, AppError> {
        if query.len() != self.dim {
            return Err(AppError::Validation(format!(
                "query dimension {} does not match index dimension {}",
                query.len(),
                self.dim
            )));
        }

        let mut hits: Vec<(usize, f32)> = match &self.clusters {
            None => self
                .data
                .chunks_exact(self.dim)
                .enumerate()
                .map(|(position, vector)| (position, squared_l2(query, vector)))
                .collect(),
            Some(clusters) => {
                let probed = nearest_centroids(&clusters.centroids, self.dim, query, clusters.nprobe);
                let mut candidates = Vec::new();
                for centroid in probed {
                    if let Some(list) = clusters.lists.get(centroid) {
                        candidates.extend(list.iter().copied());
                    }
                }
                candidates
                    .into_iter()
                    .filter_map(|id| {
                        let position = id as usize;
                        self.row(position)
                            .map(|vector| (position, squared_l2(query, vector)))
                    })
                    .collect()
            }
        };

        hits.sort_by(|a, b| {
            a.1.partial_cmp(&b.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        hits.truncate(k);
        Ok(hits)
    }

    pub fn len(&self) -> usize {
        if self.dim == 0 {
            return 0;
        }
        self.data.len() / self.dim
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.dim
    }

    pub fn kind(&self) -> IndexKind {
        if self.clusters.is_some() {
            IndexKind::Ivf
        } else {
            IndexKind::Flat
        }
    }

    /// Serializes the index to a little-endian binary file.
    pub fn save(&self, path: &Path) -> Result<(), AppError> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);

        writer.write_all(&INDEX_MAGIC)?;
        write_u32(&mut writer, INDEX_FORMAT_VERSION)?;
        let kind = if self.clusters.is_some() {
            KIND_IVF
        } else {
            KIND_FLAT
        };
        writer.write_all(&[kind])?;
        write_u32(&mut writer, checked_u32(self.dim, "index dimension")?)?;
        write_u32(&mut writer, checked_u32(self.len(), "vector count")?)?;

        if let Some(clusters) = &self.clusters {
            write_u32(&mut writer, checked_u32(clusters.lists.len(), "cluster count")?)?;
            write_u32(&mut writer, checked_u32(clusters.nprobe, "nprobe")?)?;
            write_f32_blob(&mut writer, &clusters.centroids)?;
            for list in &clusters.lists {
                write_u32(&mut writer, checked_u32(list.len(), "list length")?)?;
                for id in list {
                    write_u32(&mut writer, *id)?;
                }
            }
        }

        write_f32_blob(&mut writer, &self.data)?;
        writer.flush()?;
        Ok(())
    }

    /// Reads an index previously written by [`VectorIndex::save`].
    pub fn load(path: &Path) -> Result<Self, AppError> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);

        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if magic != INDEX_MAGIC {
            return Err(AppError::Validation(
                "not a recognized vector index file".into(),
            ));
        }
        let version = read_u32(&mut reader)?;
        if version != INDEX_FORMAT_VERSION {
            return Err(AppError::Validation(format!(
                "unsupported vector index format version {version}"
            )));
        }

        let mut kind = [0u8; 1];
        reader.read_exact(&mut kind)?;
        let dim = read_u32(&mut reader)? as usize;
        let count = read_u32(&mut reader)? as usize;
        if dim == 0 {
            return Err(AppError::Validation(
                "vector index file has zero dimension".into(),
            ));
        }

        let clusters = match kind {
            [KIND_FLAT] => None,
            [KIND_IVF] => {
                let nlist = read_u32(&mut reader)? as usize;
                let nprobe = read_u32(&mut reader)? as usize;
                let centroids = read_f32_blob(&mut reader, nlist.saturating_mul(dim))?;
                let mut lists = Vec::with_capacity(nlist);
                for _ in 0..nlist {
                    let len = read_u32(&mut reader)? as usize;
                    let mut list = Vec::with_capacity(len);
                    for _ in 0..len {
                        list.push(read_u32(&mut reader)?);
                    }
                    lists.push(list);
                }
                Some(Clusters {
                    centroids,
                    lists,
                    nprobe,
                })
            }
            other => {
                return Err(AppError::Validation(format!(
                    "unknown vector index kind {}",
                    other[0]
                )))
            }
        };

        let data = read_f32_blob(&mut reader, count.saturating_mul(dim))?;

        Ok(Self {
            dim,
            data,
            clusters,
        })
    }

    fn row(&self, position: usize) -> Option<&[f32]> {
        let start = position.checked_mul(self.dim)?;
        let end = start.checked_add(self.dim)?;
        self.data.get(start..end)
    }
}

/// `min(floor(sqrt(n)), MAX_CLUSTERS)`, matching the build policy.
pub fn cluster_count(num_vectors: usize) -> usize {
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let root = (num_vectors as f64).sqrt().floor() as usize;
    root.clamp(1, MAX_CLUSTERS)
}

fn flatten_checked(vectors: &[Vec<f32>], dim: usize) -> Result<Vec<f32>, AppError> {
    let mut data = Vec::with_capacity(vectors.len().saturating_mul(dim));
    for vector in vectors {
        if vector.len() != dim {
            return Err(AppError::Validation(format!(
                "embedding dimension {} does not match index dimension {dim}",
                vector.len()
            )));
        }
        data.extend_from_slice(vector);
    }
    Ok(data)
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

/// Lloyd's k-means with deterministic evenly spaced seeding and a fixed
/// iteration budget. Empty clusters keep their previous centroid.
fn kmeans(data: &[f32], dim: usize, nlist: usize) -> Vec<f32> {
    let n = data.len() / dim;
    let mut centroids = Vec::with_capacity(nlist.saturating_mul(dim));
    for cluster in 0..nlist {
        let pick = cluster.saturating_mul(n) / nlist;
        let start = pick.saturating_mul(dim);
        if let Some(row) = data.get(start..start.saturating_add(dim)) {
            centroids.extend_from_slice(row);
        }
    }

    for _ in 0..KMEANS_ITERATIONS {
        let mut sums = vec![0.0f32; centroids.len()];
        let mut counts = vec![0usize; nlist];

        for vector in data.chunks_exact(dim) {
            let cluster = nearest_centroid(&centroids, dim, vector);
            if let (Some(sum_row), Some(count)) = (
                sums.get_mut(cluster.saturating_mul(dim)..cluster.saturating_mul(dim).saturating_add(dim)),
                counts.get_mut(cluster),
            ) {
                for (slot, value) in sum_row.iter_mut().zip(vector.iter()) {
                    *slot += value;
                }
                *count += 1;
            }
        }

        for (cluster, count) in counts.iter().enumerate() {
            if *count == 0 {
                continue;
            }
            let start = cluster.saturating_mul(dim);
            let end = start.saturating_add(dim);
            if let (Some(centroid_row), Some(sum_row)) =
                (centroids.get_mut(start..end), sums.get(start..end))
            {
                #[allow(clippy::cast_precision_loss)]
                let scale = 1.0 / *count as f32;
                for (slot, sum) in centroid_row.iter_mut().zip(sum_row.iter()) {
                    *slot = sum * scale;
                }
            }
        }
    }

    centroids
}

fn nearest_centroid(centroids: &[f32], dim: usize, vector: &[f32]) -> usize {
    let mut best = 0usize;
    let mut best_distance = f32::INFINITY;
    for (cluster, centroid) in centroids.chunks_exact(dim).enumerate() {
        let distance = squared_l2(vector, centroid);
        if distance < best_distance {
            best = cluster;
            best_distance = distance;
        }
    }
    best
}

fn nearest_centroids(centroids: &[f32], dim: usize, vector: &[f32], nprobe: usize) -> Vec<usize> {
    let mut ranked: Vec<(usize, f32)> = centroids
        .chunks_exact(dim)
        .enumerate()
        .map(|(cluster, centroid)| (cluster, squared_l2(vector, centroid)))
        .collect();
    ranked.sort_by(|a, b| {
        a.1.partial_cmp(&b.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });
    ranked.truncate(nprobe.max(1));
    ranked.into_iter().map(|(cluster, _)| cluster).collect()
}

fn position_id(position: usize) -> Result<u32, AppError> {
    checked_u32(position, "vector position")
}

fn checked_u32(value: usize, field: &str) -> Result<u32, AppError> {
    u32::try_from(value)
        .map_err(|_| AppError::Internal(format!("{field} {value} exceeds index capacity")))
}

fn write_u32<W: Write>(writer: &mut W, value: u32) -> Result<(), AppError> {
    writer.write_all(&value.to_le_bytes())?;
    Ok(())
}

fn read_u32<R: Read>(reader: &mut R) -> Result<u32, AppError> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn write_f32_blob<W: Write>(writer: &mut W, values: &[f32]) -> Result<(), AppError> {
    for value in values {
        writer.write_all(&value.to_le_bytes())?;
    }
    Ok(())
}

fn read_f32_blob<R: Read>(reader: &mut R, len: usize) -> Result<Vec<f32>, AppError> {
    let mut bytes = vec![0u8; len.saturating_mul(4)];
    reader.read_exact(&mut bytes)?;

    let mut values = Vec::with_capacity(len);
    for chunk in bytes.chunks_exact(4) {
        let mut buf = [0u8; 4];
        buf.copy_from_slice(chunk);
        values.push(f32::from_le_bytes(buf));
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vector(seed: usize, dim: usize) -> Vec<f32> {
        #[allow(clippy::cast_precision_loss)]
        (0..dim)
            .map(|axis| ((seed * 31 + axis * 7) % 97) as f32 / 97.0)
            .collect()
    }

    fn corpus(n: usize, dim: usize) -> Vec<Vec<f32>> {
        (0..n).map(|i| vector(i, dim)).collect()
    }

    #[test]
    fn small_corpus_selects_flat_index() {
        let index = VectorIndex::build(&corpus(5, 8)).unwrap();
        assert_eq!(index.kind(), IndexKind::Flat);
        assert_eq!(index.len(), 5);
    }

    #[test]
    fn large_corpus_selects_clustered_index() {
        let index = VectorIndex::build(&corpus(120, 8)).unwrap();
        assert_eq!(index.kind(), IndexKind::Ivf);
        assert_eq!(index.len(), 120);
    }

    #[test]
    fn cluster_count_follows_sqrt_policy() {
        assert_eq!(cluster_count(100), 10);
        assert_eq!(cluster_count(120), 10);
        assert_eq!(cluster_count(10_000), 100);
        assert_eq!(cluster_count(1_000_000), 100);
    }

    #[test]
    fn flat_search_returns_ascending_distances() {
        let vectors = corpus(10, 4);
        let index = VectorIndex::build(&vectors).unwrap();
        let hits = index.search(&vector(3, 4), 5).unwrap();
        assert_eq!(hits.len(), 5);
        assert_eq!(hits.first().map(|h| h.0), Some(3));
        for pair in hits.windows(2) {
            assert!(pair[0].1 <= pair[1].1);
        }
    }

    #[test]
    fn search_with_k_beyond_corpus_returns_all() {
        let index = VectorIndex::build(&corpus(3, 4)).unwrap();
        let hits = index.search(&vector(0, 4), 10).unwrap();
        assert_eq!(hits.len(), 3);
    }

    #[test]
    fn clustered_search_finds_own_vector() {
        let vectors = corpus(150, 6);
        let index = VectorIndex::build(&vectors).unwrap();
        let hits = index.search(&vector(42, 6), 1).unwrap();
        assert_eq!(hits.first().map(|h| h.0), Some(42));
        assert!(hits.first().map(|h| h.1).unwrap_or(1.0) < 1e-9);
    }

    #[test]
    fn append_preserves_global_positions() {
        let mut index = VectorIndex::build(&corpus(4, 4)).unwrap();
        index.add(&[vector(50, 4)]).unwrap();
        assert_eq!(index.len(), 5);
        let hits = index.search(&vector(50, 4), 1).unwrap();
        assert_eq!(hits.first().map(|h| h.0), Some(4));
    }

    #[test]
    fn dimension_mismatch_is_rejected() {
        let mut index = VectorIndex::build(&corpus(4, 4)).unwrap();
        assert!(index.add(&[vector(1, 3)]).is_err());
        assert!(index.search(&vector(1, 3), 1).is_err());
    }

    #[test]
    fn empty_batch_cannot_build_an_index() {
        assert!(VectorIndex::build(&[]).is_err());
    }

    #[test]
    fn save_then_load_round_trips_search_results() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.bin");

        for n in [10usize, 130] {
            let vectors = corpus(n, 8);
            let index = VectorIndex::build(&vectors).unwrap();
            index.save(&path).unwrap();
            let reloaded = VectorIndex::load(&path).unwrap();

            assert_eq!(reloaded.kind(), index.kind());
            assert_eq!(reloaded.len(), index.len());
            let query = vector(7, 8);
            let before = index.search(&query, 5).unwrap();
            let after = reloaded.search(&query, 5).unwrap();
            assert_eq!(before.len(), after.len());
            for (a, b) in before.iter().zip(after.iter()) {
                assert_eq!(a.0, b.0);
                assert!((a.1 - b.1).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn corrupt_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.bin");
        std::fs::write(&path, b"not an index").unwrap();
        assert!(VectorIndex::load(&path).is_err());
    }
}
