//! 写真帳レイアウトモジュール
//!
//! 写真ブロックの位置からコメント欄（結合セル）の位置を決める。
//! 行・列はどちらも1始まり（Excel表記と同じ）。

// ============================================
// 写真帳レイアウト定数
// ============================================

/// 写真ブロックの開始行
pub const DATA_START_ROW: u32 = 5;

/// 写真ブロックのピッチ（行）
pub const BLOCK_PITCH: u32 = 21;

/// 写真が占める行数（5–18, 26–39, ...）
pub const IMAGE_ROWS: u32 = 14;

/// コメント欄の開始列（H）
pub const COMMENT_COL_START: u32 = 8;

/// コメント欄の列数（H:K）
pub const COMMENT_COLS: u32 = 4;

/// コメント欄の行数
pub const COMMENT_ROWS: u32 = 4;

/// 行高さが取れないときの既定値（pt）
pub const DEFAULT_ROW_HEIGHT_PT: f64 = 15.0;

// ============================================
// 行計算
// ============================================

/// 写真のアンカー行から、そのブロックのコメント開始行を返す
///
/// 開始行より上にある写真はスロット0として扱う。
/// ピッチ0も同様にスロット0へ丸める。
///
/// # Examples
/// ```
/// use photo_inspect_common::layout::comment_start_row;
///
/// assert_eq!(comment_start_row(5, 5, 21, 14), 19);
/// assert_eq!(comment_start_row(26, 5, 21, 14), 40);
/// ```
pub fn comment_start_row(
    photo_anchor_row: u32,
    data_start_row: u32,
    block_pitch: u32,
    image_row_span: u32,
) -> u32 {
    let slot = if photo_anchor_row < data_start_row {
        0
    } else {
        (photo_anchor_row - data_start_row)
            .checked_div(block_pitch)
            .unwrap_or(0)
    };
    data_start_row
        .saturating_add(image_row_span)
        .saturating_add(slot.saturating_mul(block_pitch))
}

/// 行高さの取得元（シート側の協調者が実装する）
pub trait RowMetrics {
    /// 行の高さ（pt）。不明なら None
    fn row_height(&self, row: u32) -> Option<f64>;

    /// 使用済み最終行
    fn last_used_row(&self) -> u32;
}

/// Top座標(pt)から行番号を概算
///
/// アンカー行が取れない図形で使う。行1から高さを積み上げ、
/// 積算値が `top_pts` を超えた行を返す。最終行で打ち切る。
pub fn estimate_row_from_top<M: RowMetrics + ?Sized>(metrics: &M, top_pts: f64) -> u32 {
    let max_rows = metrics.last_used_row().max(1);
    let mut y = 0.0;

    for row in 1..=max_rows {
        let height = metrics.row_height(row).unwrap_or(DEFAULT_ROW_HEIGHT_PT);
        if y + height > top_pts {
            return row;
        }
        y += height;
    }

    max_rows
}

// ============================================
// レイアウト設定構造体
// ============================================

/// 写真帳シートのレイアウト
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SheetLayout {
    pub data_start_row: u32,
    pub block_pitch: u32,
    pub image_rows: u32,
    pub comment_col_start: u32,
    pub comment_cols: u32,
    pub comment_rows: u32,
}

impl Default for SheetLayout {
    fn default() -> Self {
        Self {
            data_start_row: DATA_START_ROW,
            block_pitch: BLOCK_PITCH,
            image_rows: IMAGE_ROWS,
            comment_col_start: COMMENT_COL_START,
            comment_cols: COMMENT_COLS,
            comment_rows: COMMENT_ROWS,
        }
    }
}

impl SheetLayout {
    /// アンカー行 → コメント開始行
    pub fn comment_start_row(&self, photo_anchor_row: u32) -> u32 {
        comment_start_row(
            photo_anchor_row,
            self.data_start_row,
            self.block_pitch,
            self.image_rows,
        )
    }

    /// アンカー行 → コメント欄
    pub fn comment_block(&self, photo_anchor_row: u32) -> CommentBlock {
        CommentBlock {
            start_row: self.comment_start_row(photo_anchor_row),
            first_col: self.comment_col_start,
            cols: self.comment_cols,
            rows: self.comment_rows,
        }
    }
}

/// コメント欄（結合されるセル範囲）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommentBlock {
    pub start_row: u32,
    pub first_col: u32,
    pub cols: u32,
    pub rows: u32,
}

impl CommentBlock {
    pub fn last_row(&self) -> u32 {
        self.start_row + self.rows.max(1) - 1
    }

    pub fn last_col(&self) -> u32 {
        self.first_col + self.cols.max(1) - 1
    }

    pub fn contains(&self, row: u32, col: u32) -> bool {
        (self.start_row..=self.last_row()).contains(&row)
            && (self.first_col..=self.last_col()).contains(&col)
    }

    /// 範囲が重なるか
    pub fn overlaps(&self, other: &CommentBlock) -> bool {
        self.start_row <= other.last_row()
            && other.start_row <= self.last_row()
            && self.first_col <= other.last_col()
            && other.first_col <= self.last_col()
    }

    /// A1形式の範囲（例: "H19:K22"）
    pub fn range_ref(&self) -> String {
        format!(
            "{}{}:{}{}",
            column_letters(self.first_col),
            self.start_row,
            column_letters(self.last_col()),
            self.last_row()
        )
    }
}

impl std::fmt::Display for CommentBlock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.range_ref())
    }
}

// ============================================
// ヘルパー関数
// ============================================

/// 列番号（1始まり）→ 列記号
pub fn column_letters(col: u32) -> String {
    let mut n = col.max(1);
    let mut letters = Vec::new();
    while n > 0 {
        let rem = ((n - 1) % 26) as u8;
        letters.push((b'A' + rem) as char);
        n = (n - 1) / 26;
    }
    letters.iter().rev().collect()
}

/// 列記号 → 列番号（1始まり）
pub fn column_index(letters: &str) -> Option<u32> {
    if letters.is_empty() {
        return None;
    }
    letters.chars().try_fold(0u32, |acc, ch| {
        if !ch.is_ascii_alphabetic() {
            return None;
        }
        let digit = (ch.to_ascii_uppercase() as u8 - b'A' + 1) as u32;
        acc.checked_mul(26)?.checked_add(digit)
    })
}
