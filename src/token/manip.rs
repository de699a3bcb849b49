use super::{TokenBlock, TokenRef};
use crate::{AnnErr, Result, buffer::blas};

/// Concatenates single pattern tokens into one bunch token.
///
/// # Arguments
/// * `patterns` - The patterns, all of them must be blocks of the same size.
///
/// # Returns
/// A block holding `patterns.len()` patterns or an error if they are empty, of the wrong kind or
/// of different sizes.
pub fn concat_bunch(patterns: &[TokenRef]) -> Result<TokenBlock> {
    let first = patterns.first().ok_or(AnnErr::ZeroSize { what: "bunch" })?;
    let size = first.borrow().as_block("pattern")?.used_size();
    let mut bunch = TokenBlock::new(size * patterns.len());

    for (pos, pattern) in patterns.iter().enumerate() {
        let mut token = pattern.borrow_mut();
        push_pattern_at(&mut bunch, pos, token.as_block_mut("pattern")?)?;
    }

    Ok(bunch)
}

/// Writes `pattern` at position `pos` of `bunch`.
///
/// # Returns
/// An error if the bunch size isn't a multiple of the pattern size or `pos` is out of the bunch.
pub fn push_pattern_at(bunch: &mut TokenBlock, pos: usize, pattern: &mut TokenBlock) -> Result<()> {
    let size = pattern.used_size();
    let bunch_size = bunch_size_of(bunch, size)?;

    if pos >= bunch_size {
        return Err(AnnErr::SizeMismatch {
            a: "pattern position",
            b: "bunch size",
            got: pos,
            expected: bunch_size,
        });
    }

    blas::scopy(
        size,
        pattern.buffer_mut(),
        0,
        1,
        bunch.buffer_mut(),
        pos,
        bunch_size,
        false,
    );

    Ok(())
}

/// Extracts the pattern at position `pos` of a bunch of `size` long vectors.
pub fn pattern_at(bunch: &mut TokenBlock, pos: usize, size: usize) -> Result<TokenBlock> {
    let bunch_size = bunch_size_of(bunch, size)?;

    if pos >= bunch_size {
        return Err(AnnErr::SizeMismatch {
            a: "pattern position",
            b: "bunch size",
            got: pos,
            expected: bunch_size,
        });
    }

    let mut pattern = TokenBlock::new(size);
    blas::scopy(
        size,
        bunch.buffer_mut(),
        pos,
        bunch_size,
        pattern.buffer_mut(),
        0,
        1,
        false,
    );

    Ok(pattern)
}

/// Builds a bunch token from row major patterns.
pub fn bunch_from_rows<R: AsRef<[f32]>>(rows: &[R]) -> Result<TokenBlock> {
    let size = rows.first().map(|r| r.as_ref().len()).unwrap_or(0);
    if size == 0 {
        return Err(AnnErr::ZeroSize { what: "bunch" });
    }

    let n = rows.len();
    let mut data = vec![0.; size * n];

    for (b, row) in rows.iter().enumerate() {
        let row = row.as_ref();
        if row.len() != size {
            return Err(AnnErr::SizeMismatch {
                a: "row",
                b: "first row",
                got: row.len(),
                expected: size,
            });
        }

        row.iter().enumerate().for_each(|(i, &x)| data[i * n + b] = x);
    }

    Ok(TokenBlock::from_vec(data))
}

/// Splits a bunch of `size` long vectors into row major patterns.
pub fn rows_of(bunch: &mut TokenBlock, size: usize) -> Result<Vec<Vec<f32>>> {
    let n = bunch_size_of(bunch, size)?;
    let data = bunch.read();

    Ok((0..n)
        .map(|b| (0..size).map(|i| data[i * n + b]).collect())
        .collect())
}

fn bunch_size_of(bunch: &TokenBlock, size: usize) -> Result<usize> {
    if size == 0 {
        return Err(AnnErr::ZeroSize { what: "pattern" });
    }

    if bunch.used_size() % size != 0 {
        return Err(AnnErr::SizeMismatch {
            a: "bunch",
            b: "pattern",
            got: bunch.used_size(),
            expected: size * (bunch.used_size() / size + 1),
        });
    }

    Ok(bunch.used_size() / size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::Token;

    #[test]
    fn test_concat_interleaves_patterns() {
        let a = TokenBlock::from_vec(vec![1., 2.]).into_ref();
        let b = TokenBlock::from_vec(vec![3., 4.]).into_ref();

        let mut bunch = concat_bunch(&[a, b]).unwrap();
        assert_eq!(bunch.read(), &[1., 3., 2., 4.]);
    }

    #[test]
    fn test_concat_rejects_vector_tokens() {
        let v = Token::Vector(vec![]).into_ref();
        assert!(matches!(
            concat_bunch(&[v]),
            Err(AnnErr::WrongTokenKind { .. })
        ));
    }

    #[test]
    fn test_rows_round_trip() {
        let rows = vec![vec![1., 2., 3.], vec![4., 5., 6.]];
        let mut bunch = bunch_from_rows(&rows).unwrap();
        assert_eq!(bunch.read(), &[1., 4., 2., 5., 3., 6.]);
        assert_eq!(rows_of(&mut bunch, 3).unwrap(), rows);

        let mut second = pattern_at(&mut bunch, 1, 3).unwrap();
        assert_eq!(second.read(), &[4., 5., 6.]);
    }

    #[test]
    fn test_push_out_of_bunch() {
        let mut bunch = TokenBlock::new(4);
        let mut pattern = TokenBlock::from_vec(vec![1., 1.]);
        assert!(push_pattern_at(&mut bunch, 2, &mut pattern).is_err());
    }
}
