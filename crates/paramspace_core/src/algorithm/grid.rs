/// Iterator over every index tuple of an N-dimensional grid
///
/// Row-major: the last dimension varies fastest. Yields nothing if any
/// dimension is empty or there are no dimensions.
pub struct GridIndices {
    shape: Vec<usize>,
    current: Vec<usize>,
    done: bool,
}

impl GridIndices {
    pub fn new(shape: Vec<usize>) -> Self {
        let done = shape.is_empty() || shape.contains(&0);
        Self {
            current: vec![0; shape.len()],
            shape,
            done,
        }
    }

    /// Total number of tuples
    pub fn total(&self) -> usize {
        if self.shape.is_empty() {
            0
        } else {
            self.shape.iter().product()
        }
    }
}

impl Iterator for GridIndices {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let result = self.current.clone();

        for i in (0..self.shape.len()).rev() {
            self.current[i] += 1;
            if self.current[i] < self.shape[i] {
                break;
            }
            self.current[i] = 0;
            if i == 0 {
                self.done = true;
            }
        }

        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_dimension_fastest() {
        let all: Vec<_> = GridIndices::new(vec![2, 1, 2]).collect();
        assert_eq!(
            all,
            vec![vec![0, 0, 0], vec![0, 0, 1], vec![1, 0, 0], vec![1, 0, 1]]
        );
    }

    #[test]
    fn test_empty_dimension() {
        assert_eq!(GridIndices::new(vec![3, 0]).count(), 0);
        assert_eq!(GridIndices::new(vec![]).count(), 0);
        assert_eq!(GridIndices::new(vec![]).total(), 0);
        assert_eq!(GridIndices::new(vec![2, 3]).total(), 6);
    }
}
