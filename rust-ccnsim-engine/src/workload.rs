//! File catalog with Zipf-like request popularity.

use crate::tiebreak::generate_random_string;
use log::info;
use rand::seq::SliceRandom;
use rand::Rng;
use rust_ccnsim_common::ndn::Name;

/// Length of the random file component.
const FILE_ID_LENGTH: usize = 10;

#[derive(Debug, Clone, Default)]
pub struct FileCatalog {
    files: Vec<Name>,
    /// Normalized cumulative request probability, same order as `files`.
    cumulative: Vec<f64>,
}

impl FileCatalog {
    /// `files_per_prefix` files per prefix named `prefix/<random>/<chunks>`, shuffled.
    pub fn generate<R: Rng>(
        prefixes: &[Name],
        files_per_prefix: usize,
        chunks_per_file: u32,
        alpha: f64,
        rng: &mut R,
    ) -> Self {
        let mut files = Vec::with_capacity(prefixes.len() * files_per_prefix);
        for prefix in prefixes {
            for _ in 0..files_per_prefix {
                let id = generate_random_string(rng.gen(), FILE_ID_LENGTH);
                files.push(prefix.child(id).child(chunks_per_file));
            }
        }
        files.shuffle(rng);

        info!(
            "Generated {} files over {} prefixes (alpha {})",
            files.len(),
            prefixes.len(),
            alpha
        );
        Self::from_files(files, alpha)
    }

    /// Builds the popularity table over `files` in the given order; the first is the most popular.
    pub fn from_files(files: Vec<Name>, alpha: f64) -> Self {
        let mut cumulative = Vec::with_capacity(files.len());
        let mut sum = 0.0;
        for i in 0..files.len() {
            sum += 1.0 / ((i + 1) as f64).powf(alpha);
            cumulative.push(sum);
        }
        for c in cumulative.iter_mut() {
            *c /= sum;
        }
        Self { files, cumulative }
    }

    /// First file whose cumulative probability reaches a uniform draw.
    pub fn draw<R: Rng>(&self, rng: &mut R) -> Option<&Name> {
        let u: f64 = rng.gen();
        let idx = self.cumulative.partition_point(|&c| c < u);
        self.files.get(idx.min(self.files.len().saturating_sub(1)))
    }

    pub fn files(&self) -> &[Name] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Request probability of the file at `index`.
    pub fn probability(&self, index: usize) -> Option<f64> {
        let upper = *self.cumulative.get(index)?;
        let lower = if index == 0 { 0.0 } else { self.cumulative[index - 1] };
        Some(upper - lower)
    }
}

/// Chunk count a file name ends with.
pub fn chunks_of(file: &Name) -> Option<u32> {
    file.get(file.len().checked_sub(1)?)?.as_number()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_generate_names() {
        let mut rng = StdRng::seed_from_u64(0);
        let catalog = FileCatalog::generate(
            &[Name::from_string("google"), Name::from_string("yahoo")],
            5,
            100,
            0.75,
            &mut rng,
        );
        assert_eq!(catalog.len(), 10);
        for file in catalog.files() {
            assert_eq!(file.len(), 3);
            assert_eq!(file.get(1).unwrap().as_bytes().len(), 10);
            assert_eq!(chunks_of(file), Some(100));
        }
    }

    #[test]
    fn test_generation_is_seeded() {
        let prefixes = [Name::from_string("p")];
        let a = FileCatalog::generate(&prefixes, 4, 10, 0.75, &mut StdRng::seed_from_u64(3));
        let b = FileCatalog::generate(&prefixes, 4, 10, 0.75, &mut StdRng::seed_from_u64(3));
        assert_eq!(a.files(), b.files());
    }

    #[test]
    fn test_zipf_probabilities() {
        let files = (0..4).map(|i| Name::from_string(&format!("p/f{}/10", i))).collect();
        let catalog = FileCatalog::from_files(files, 0.75);

        let total: f64 = (0..4).map(|i| catalog.probability(i).unwrap()).sum();
        assert!((total - 1.0).abs() < 1e-9);
        assert!(catalog.probability(0).unwrap() > catalog.probability(1).unwrap());
        assert!(catalog.probability(2).unwrap() > catalog.probability(3).unwrap());
        assert!(catalog.probability(4).is_none());
    }

    #[test]
    fn test_draw_favors_popular_files() {
        let files: Vec<Name> = (0..20).map(|i| Name::from_string(&format!("p/f{}/10", i))).collect();
        let catalog = FileCatalog::from_files(files.clone(), 1.0);
        let mut rng = StdRng::seed_from_u64(42);

        let mut first = 0;
        let mut last = 0;
        for _ in 0..5000 {
            let file = catalog.draw(&mut rng).unwrap();
            if *file == files[0] {
                first += 1;
            } else if *file == files[19] {
                last += 1;
            }
        }
        assert!(first > last * 5);
    }

    #[test]
    fn test_empty_catalog() {
        let catalog = FileCatalog::default();
        assert!(catalog.draw(&mut StdRng::seed_from_u64(0)).is_none());
    }
}
