use rand::Rng;
use rand_distr::StandardNormal;
use rayon::prelude::*;
use serde::{Serialize, Deserialize};

// row-major 2D tensor, exclusively owned by whoever holds it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tensor {
    data: Vec<f32>,
    rows: usize,
    cols: usize
}

impl Tensor {
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            data: vec![0.0; rows * cols],
            rows,
            cols
        }
    }

    // samples N(0, std^2)
    pub fn random<R: Rng + ?Sized>(rows: usize, cols: usize, std: f32, rng: &mut R) -> Self {
        let data: Vec<f32> = (0..rows * cols)
            .map(|_| rng.sample::<f32, _>(StandardNormal) * std)
            .collect();

        Self { data, rows, cols }
    }

    pub fn from_vec(data: Vec<f32>, rows: usize, cols: usize) -> Self {
        assert_eq!(data.len(), rows * cols, "data length must equal rows * cols");
        Self { data, rows, cols }
    }

    // stacks fixed-width rows into a (rows.len(), N) tensor
    pub fn from_rows<const N: usize>(rows: &[[f32; N]]) -> Self {
        let data: Vec<f32> = rows.iter().flat_map(|row| row.iter().copied()).collect();
        Self {
            data,
            rows: rows.len(),
            cols: N
        }
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn read(&self) -> &[f32] {
        &self.data
    }

    pub fn write(&mut self) -> &mut [f32] {
        &mut self.data
    }

    pub fn row(&self, index: usize) -> &[f32] {
        assert!(index < self.rows, "row index out of bounds");
        &self.data[index * self.cols..(index + 1) * self.cols]
    }

    // self @ other
    pub fn matmul(&self, other: &Tensor) -> Tensor {
        assert_eq!(self.cols, other.rows, "self columns must equal other rows");

        let k = self.cols;
        let n = other.cols;
        let mut c = Tensor::zeros(self.rows, n);
        if n == 0 {
            return c;
        }

        c.data.par_chunks_mut(n).enumerate().for_each(|(m_idx, c_row)| {
            let a_row = &self.data[m_idx * k..(m_idx + 1) * k];
            for (k_idx, &a_val) in a_row.iter().enumerate() {
                let b_row = &other.data[k_idx * n..(k_idx + 1) * n];
                for (c_val, &b_val) in c_row.iter_mut().zip(b_row) {
                    *c_val += a_val * b_val;
                }
            }
        });

        c
    }

    // self.T @ other, without materializing the transpose
    pub fn t_matmul(&self, other: &Tensor) -> Tensor {
        assert_eq!(self.rows, other.rows, "self rows must equal other rows");

        let k = self.cols;
        let n = other.cols;
        let mut c = Tensor::zeros(k, n);
        if n == 0 {
            return c;
        }

        c.data.par_chunks_mut(n).enumerate().for_each(|(i, c_row)| {
            for r in 0..self.rows {
                let a_val = self.data[r * k + i];
                let b_row = &other.data[r * n..(r + 1) * n];
                for (c_val, &b_val) in c_row.iter_mut().zip(b_row) {
                    *c_val += a_val * b_val;
                }
            }
        });

        c
    }

    // self @ other.T
    pub fn matmul_t(&self, other: &Tensor) -> Tensor {
        assert_eq!(self.cols, other.cols, "self columns must equal other columns");

        let k = self.cols;
        let n = other.rows;
        let mut c = Tensor::zeros(self.rows, n);
        if n == 0 {
            return c;
        }

        c.data.par_chunks_mut(n).enumerate().for_each(|(m_idx, c_row)| {
            let a_row = &self.data[m_idx * k..(m_idx + 1) * k];
            for (j, c_val) in c_row.iter_mut().enumerate() {
                let b_row = &other.data[j * k..(j + 1) * k];
                *c_val = a_row.iter().zip(b_row).map(|(a, b)| a * b).sum();
            }
        });

        c
    }

    // sums over rows, producing a (1, cols) tensor
    pub fn column_sums(&self) -> Tensor {
        let mut sums = vec![0.0; self.cols];
        for row in self.data.chunks(self.cols.max(1)) {
            for (acc, &x) in sums.iter_mut().zip(row) {
                *acc += x;
            }
        }
        Tensor::from_vec(sums, 1, self.cols)
    }

    // adds a (1, cols) row to every row
    pub fn add_row(&self, row: &Tensor) -> Tensor {
        assert_eq!(row.shape(), (1, self.cols), "row must be (1, cols)");

        let mut out = self.clone();
        if self.cols == 0 {
            return out;
        }
        out.data.par_chunks_mut(self.cols).for_each(|out_row| {
            for (x, &b) in out_row.iter_mut().zip(&row.data) {
                *x += b;
            }
        });
        out
    }

    pub fn map<F>(&self, f: F) -> Tensor
    where F: Fn(f32) -> f32 + Sync + Send {
        let data: Vec<f32> = self.data.par_iter().map(|&x| f(x)).collect();
        Tensor::from_vec(data, self.rows, self.cols)
    }

    // map through self allowing access to second tensor
    pub fn map2<F>(&self, other: &Tensor, f: F) -> Tensor
    where F: Fn(f32, f32) -> f32 + Sync + Send {
        assert_eq!(self.shape(), other.shape(), "tensors must have the same shape");

        let data: Vec<f32> = self.data.par_iter().zip(other.data.par_iter()).map(|(&x1, &x2)| f(x1, x2)).collect();
        Tensor::from_vec(data, self.rows, self.cols)
    }

    // first maximum wins on ties
    pub fn argmax_rows(&self) -> Vec<usize> {
        self.data
            .chunks(self.cols.max(1))
            .take(self.rows)
            .map(|row| {
                let mut best = 0;
                for (i, &x) in row.iter().enumerate() {
                    if x > row[best] {
                        best = i;
                    }
                }
                best
            })
            .collect()
    }

    pub fn max_rows(&self) -> Vec<f32> {
        self.data
            .chunks(self.cols.max(1))
            .take(self.rows)
            .map(|row| row.iter().fold(f32::NEG_INFINITY, |a, &b| a.max(b)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn assert_vec_approx_eq(a: &[f32], b: &[f32]) {
        let tolerance = 1e-4;
        assert_eq!(a.len(), b.len(), "vectors have different lengths");
        for (i, (x, y)) in a.iter().zip(b.iter()).enumerate() {
            assert!((x - y).abs() < tolerance, "mismatch at index {}: {} vs {}", i, x, y);
        }
    }

    fn transpose(t: &Tensor) -> Tensor {
        let mut data = Vec::with_capacity(t.rows * t.cols);
        for j in 0..t.cols {
            for i in 0..t.rows {
                data.push(t.data[i * t.cols + j]);
            }
        }
        Tensor::from_vec(data, t.cols, t.rows)
    }

    fn reference_matmul(a: &Tensor, b: &Tensor) -> Vec<f32> {
        let mut result = vec![0.0; a.rows * b.cols];
        for i in 0..a.rows {
            for j in 0..b.cols {
                let mut sum = 0.0;
                for l in 0..a.cols {
                    sum += a.data[i * a.cols + l] * b.data[l * b.cols + j];
                }
                result[i * b.cols + j] = sum;
            }
        }
        result
    }

    #[test]
    fn test_zeros() {
        let t = Tensor::zeros(2, 3);
        assert_eq!(t.read(), &[0.0; 6]);
        assert_eq!(t.shape(), (2, 3));
    }

    #[test]
    fn test_random_is_seeded() {
        let a = Tensor::random(10, 4, 1.0, &mut StdRng::seed_from_u64(7));
        let b = Tensor::random(10, 4, 1.0, &mut StdRng::seed_from_u64(7));
        assert_eq!(a, b);
        assert_eq!(a.read().len(), 40);
    }

    #[test]
    fn test_from_rows() {
        let t = Tensor::from_rows(&[[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]]);
        assert_eq!(t.shape(), (3, 2));
        assert_eq!(t.row(1), &[3.0, 4.0]);
    }

    #[test]
    #[should_panic]
    fn test_from_vec_length_mismatch() {
        Tensor::from_vec(vec![1.0, 2.0, 3.0], 2, 2);
    }

    #[test]
    fn test_matmul_simple() {
        // A: [[1, 2, 3], [4, 5, 6]]
        let a = Tensor::from_vec(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], 2, 3);
        // B: [[7, 8], [9, 10], [11, 12]]
        let b = Tensor::from_vec(vec![7.0, 8.0, 9.0, 10.0, 11.0, 12.0], 3, 2);

        let c = a.matmul(&b);

        assert_eq!(c.shape(), (2, 2));
        assert_eq!(c.read(), &[58.0, 64.0, 139.0, 154.0]);
    }

    #[test]
    fn test_transposed_products_against_reference() {
        let mut rng = StdRng::seed_from_u64(3);
        let a = Tensor::random(17, 9, 1.0, &mut rng);
        let b = Tensor::random(17, 5, 1.0, &mut rng);
        let c = Tensor::random(6, 9, 1.0, &mut rng);

        let at_b = a.t_matmul(&b);
        assert_eq!(at_b.shape(), (9, 5));
        assert_vec_approx_eq(at_b.read(), &reference_matmul(&transpose(&a), &b));

        let a_ct = a.matmul_t(&c);
        assert_eq!(a_ct.shape(), (17, 6));
        assert_vec_approx_eq(a_ct.read(), &reference_matmul(&a, &transpose(&c)));
    }

    #[test]
    fn test_matmul_against_reference() {
        let mut rng = StdRng::seed_from_u64(11);
        let a = Tensor::random(64, 32, 1.0, &mut rng);
        let b = Tensor::random(32, 70, 1.0, &mut rng);

        let result_fast = a.matmul(&b);

        assert_eq!(result_fast.shape(), (64, 70));
        assert_vec_approx_eq(result_fast.read(), &reference_matmul(&a, &b));
    }

    #[test]
    fn test_column_sums() {
        let t = Tensor::from_vec(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], 2, 3);
        let s = t.column_sums();

        assert_eq!(s.shape(), (1, 3));
        assert_vec_approx_eq(s.read(), &[5.0, 7.0, 9.0]);
    }

    #[test]
    fn test_add_row() {
        let t = Tensor::from_vec(vec![1.0, 2.0, 3.0, 4.0], 2, 2);
        let bias = Tensor::from_vec(vec![10.0, 20.0], 1, 2);
        assert_eq!(t.add_row(&bias).read(), &[11.0, 22.0, 13.0, 24.0]);
    }

    #[test]
    fn test_map_and_map2() {
        let a = Tensor::from_vec(vec![1.0, 2.0, -3.0], 1, 3);
        let b = Tensor::from_vec(vec![10.0, 20.0, 30.0], 1, 3);

        assert_vec_approx_eq(a.map(|x| x * 2.0).read(), &[2.0, 4.0, -6.0]);
        assert_vec_approx_eq(a.map2(&b, |x, y| x + y).read(), &[11.0, 22.0, 27.0]);
    }

    #[test]
    #[should_panic]
    fn test_map2_shape_mismatch() {
        let a = Tensor::from_vec(vec![1.0, 2.0, 3.0], 1, 3);
        let b = Tensor::from_vec(vec![10.0, 20.0], 1, 2);
        a.map2(&b, |x, y| x + y);
    }

    #[test]
    fn test_argmax_rows_prefers_lowest_index_on_ties() {
        let t = Tensor::from_vec(vec![
            0.0, 0.0, 0.0, 0.0,
            1.0, 3.0, 3.0, 2.0,
            -1.0, -2.0, -0.5, -0.5,
        ], 3, 4);

        assert_eq!(t.argmax_rows(), vec![0, 1, 2]);
        assert_eq!(t.max_rows(), vec![0.0, 3.0, -0.5]);
    }
}
