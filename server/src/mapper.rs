use common::board::{BoardSpec, Point};

use crate::surface::SurfaceSize;

/// 棋盘逻辑坐标到屏幕物理坐标的映射
///
/// - standard: 棋盘居中，每个格子对应一个像素
/// - wrapped: 棋盘从 (0, 0) 开始平铺满整个屏幕，每个格子对应多个像素
///
/// 逻辑 y 轴向上，物理行号向下，所以纵向需要翻转。
/// 平铺原点在会话开始时一次算好，渲染过程中不会改变。
#[derive(Debug, Clone)]
pub struct CoordinateMapper {
    board: BoardSpec,
    surface: SurfaceSize,
    offset_x: i64,
    offset_y: i64,
    tile_origins: Vec<(i64, i64)>,
}

impl CoordinateMapper {
    pub fn new(board: BoardSpec, surface: SurfaceSize) -> Self {
        let width = board.width as i64;
        let height = board.height as i64;
        let (offset_x, offset_y, tile_origins) = if board.ruleset.is_wrapped() {
            (0, 0, tile_steps(width, surface.columns, height, surface.rows))
        } else {
            let offset_x = (surface.columns as i64 - width).div_euclid(2);
            let offset_y = (surface.rows as i64 - height).div_euclid(2);
            (offset_x, offset_y, vec![(offset_x, offset_y)])
        };
        Self {
            board,
            surface,
            offset_x,
            offset_y,
            tile_origins,
        }
    }

    pub fn surface(&self) -> SurfaceSize {
        self.surface
    }

    pub fn offset(&self) -> (i64, i64) {
        (self.offset_x, self.offset_y)
    }

    /// 每个棋盘副本左上角所在的物理坐标
    pub fn tile_origins(&self) -> &[(i64, i64)] {
        &self.tile_origins
    }

    /// 逻辑坐标对应的所有物理坐标，超出屏幕的部分被丢弃
    pub fn map(&self, point: Point) -> impl Iterator<Item = (i64, i64)> + '_ {
        let flipped_y = self.board.height as i64 - point.y as i64 - 1;
        self.tile_origins
            .iter()
            .map(move |(x_step, y_step)| (x_step + point.x as i64, y_step + flipped_y))
            .filter(|(x, y)| self.surface.contains(*x, *y))
    }

    /// 棋盘范围内的全部逻辑坐标
    pub fn board_cells(&self) -> impl Iterator<Item = Point> {
        let (width, height) = (self.board.width.max(0), self.board.height.max(0));
        (0..width).flat_map(move |x| (0..height).map(move |y| Point::new(x, y)))
    }
}

/// 从 0 开始按棋盘宽高步进，直到超出屏幕；棋盘尺寸非正时没有副本
fn tile_steps(width: i64, columns: usize, height: i64, rows: usize) -> Vec<(i64, i64)> {
    if width <= 0 || height <= 0 {
        return Vec::new();
    }
    let x_steps = (0..columns as i64).step_by(width as usize);
    x_steps
        .flat_map(|x_step| {
            (0..rows as i64)
                .step_by(height as usize)
                .map(move |y_step| (x_step, y_step))
        })
        .collect()
}

#[cfg(test)]
mod test {
    use common::board::RulesetKind;

    use super::*;

    const SURFACE: SurfaceSize = SurfaceSize::new(32, 16);

    #[test]
    fn test_standard_centering() {
        let mapper = CoordinateMapper::new(BoardSpec::new(11, 11, RulesetKind::Standard), SURFACE);
        assert_eq!(mapper.offset(), (10, 2));
        assert_eq!(mapper.map(Point::new(0, 0)).collect::<Vec<_>>(), vec![(10, 12)]);
        assert_eq!(mapper.map(Point::new(10, 10)).collect::<Vec<_>>(), vec![(20, 2)]);
    }

    #[test]
    fn test_unknown_ruleset_maps_like_standard() {
        let mapper = CoordinateMapper::new(
            BoardSpec::new(11, 11, RulesetKind::Other("royale".to_string())),
            SURFACE,
        );
        assert_eq!(mapper.offset(), (10, 2));
        assert_eq!(mapper.tile_origins(), &[(10, 2)]);
    }

    #[test]
    fn test_standard_board_larger_than_surface() {
        let mapper = CoordinateMapper::new(BoardSpec::new(25, 19, RulesetKind::Standard), SURFACE);
        // floor(-3 / 2) = -2
        assert_eq!(mapper.offset(), (3, -2));
        // 顶部两行和底部一行落在屏幕外
        assert_eq!(mapper.map(Point::new(0, 18)).count(), 0);
        assert_eq!(mapper.map(Point::new(0, 0)).count(), 0);
        assert_eq!(mapper.map(Point::new(0, 1)).collect::<Vec<_>>(), vec![(3, 15)]);
        assert_eq!(mapper.map(Point::new(0, 2)).collect::<Vec<_>>(), vec![(3, 14)]);
    }

    #[test]
    fn test_wrapped_tiling() {
        let mapper = CoordinateMapper::new(BoardSpec::new(11, 11, RulesetKind::Wrapped), SURFACE);
        assert_eq!(mapper.offset(), (0, 0));
        assert_eq!(
            mapper.tile_origins(),
            &[(0, 0), (0, 11), (11, 0), (11, 11), (22, 0), (22, 11)]
        );
        let mapped: Vec<_> = mapper.map(Point::new(0, 10)).collect();
        assert_eq!(
            mapped,
            vec![(0, 0), (0, 11), (11, 0), (11, 11), (22, 0), (22, 11)]
        );
        // 第二行副本的底部超出屏幕
        let mapped: Vec<_> = mapper.map(Point::new(0, 0)).collect();
        assert_eq!(mapped, vec![(0, 10), (11, 10), (22, 10)]);
    }

    #[test]
    fn test_wrapped_stays_in_bounds() {
        let mapper = CoordinateMapper::new(BoardSpec::new(11, 11, RulesetKind::Wrapped), SURFACE);
        for cell in mapper.board_cells() {
            for (x, y) in mapper.map(cell) {
                assert!((0..32).contains(&x) && (0..16).contains(&y), "{:?}", (x, y));
            }
        }
    }

    #[test]
    fn test_wrapped_degenerate_board_terminates() {
        let mapper = CoordinateMapper::new(BoardSpec::new(0, 11, RulesetKind::Wrapped), SURFACE);
        assert!(mapper.tile_origins().is_empty());
        assert_eq!(mapper.map(Point::new(0, 0)).count(), 0);
        assert_eq!(mapper.board_cells().count(), 0);
    }

    #[test]
    fn test_board_cells() {
        let mapper = CoordinateMapper::new(BoardSpec::new(3, 2, RulesetKind::Standard), SURFACE);
        assert_eq!(mapper.board_cells().count(), 6);
    }
}
