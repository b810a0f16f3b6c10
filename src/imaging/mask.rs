//! # 二值掩膜
//!
//! 分割结果的二值表示，以及开/闭运算、8 连通标记和目标几何量。
//!
//! 目标几何量按细长带状目标近似：长度 ≈ 周长 / 2，直径 ≈ 面积 / 长度。
//!
//! ## 依赖关系
//! - 被 `adapters/segment.rs`、`adapters/tennant.rs` 使用

use super::FloatImage;

use image::{DynamicImage, GrayImage, Luma};
use std::collections::VecDeque;

/// 二值掩膜（true = 前景）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mask {
    width: u32,
    height: u32,
    data: Vec<bool>,
}

/// 连通目标
#[derive(Debug, Clone)]
pub struct Component {
    /// 像素索引（行优先）
    pub pixels: Vec<usize>,
    /// 与背景或图像边界相邻的像素边数
    pub perimeter: usize,
}

impl Component {
    pub fn area(&self) -> usize {
        self.pixels.len()
    }

    /// 近似中轴长度
    pub fn length(&self) -> f64 {
        self.perimeter as f64 / 2.0
    }

    /// 近似平均直径
    pub fn diameter(&self) -> f64 {
        let length = self.length();
        if length > 0.0 {
            self.area() as f64 / length
        } else {
            0.0
        }
    }

    /// 长宽比
    pub fn elongation(&self) -> f64 {
        let diameter = self.diameter();
        if diameter > 0.0 {
            self.length() / diameter
        } else {
            0.0
        }
    }
}

impl Mask {
    pub fn new(width: u32, height: u32) -> Self {
        Mask {
            width,
            height,
            data: vec![false; (width * height) as usize],
        }
    }

    /// 阈值化：`dark` 为 true 时选择低于阈值的像素
    pub fn from_threshold(img: &FloatImage, level: f32, dark: bool) -> Self {
        let data = img
            .as_raw()
            .iter()
            .map(|v| if dark { *v < level } else { *v > level })
            .collect();
        Mask {
            width: img.width(),
            height: img.height(),
            data,
        }
    }

    /// 从二值图像读取（亮度 > 127 为前景）
    pub fn from_image(img: &DynamicImage) -> Self {
        let luma = img.to_luma8();
        let data = luma.as_raw().iter().map(|v| *v > 127).collect();
        Mask {
            width: luma.width(),
            height: luma.height(),
            data,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn get(&self, x: u32, y: u32) -> bool {
        self.data[(y * self.width + x) as usize]
    }

    pub fn set(&mut self, x: u32, y: u32, value: bool) {
        self.data[(y * self.width + x) as usize] = value;
    }

    /// 前景像素数
    pub fn count(&self) -> usize {
        self.data.iter().filter(|v| **v).count()
    }

    /// 转为黑底白目标的 8 位图像
    pub fn to_image(&self) -> GrayImage {
        GrayImage::from_fn(self.width, self.height, |x, y| {
            Luma([if self.get(x, y) { 255 } else { 0 }])
        })
    }

    /// 方形结构元腐蚀
    pub fn erode(&self, radius: u32) -> Mask {
        self.square_filter(radius, true)
    }

    /// 方形结构元膨胀
    pub fn dilate(&self, radius: u32) -> Mask {
        self.square_filter(radius, false)
    }

    /// 开运算（去除小噪点）
    pub fn open(&self, radius: u32) -> Mask {
        self.erode(radius).dilate(radius)
    }

    /// 闭运算（填补小缝隙）
    pub fn close(&self, radius: u32) -> Mask {
        self.dilate(radius).erode(radius)
    }

    /// 可分离的方形最小/最大滤波；图像外按背景处理
    fn square_filter(&self, radius: u32, erode: bool) -> Mask {
        let (w, h) = (self.width as i64, self.height as i64);
        let r = radius as i64;

        let pass = |src: &[bool], horizontal: bool| -> Vec<bool> {
            let mut out = vec![false; src.len()];
            for y in 0..h {
                for x in 0..w {
                    let mut acc = erode;
                    for d in -r..=r {
                        let (nx, ny) = if horizontal { (x + d, y) } else { (x, y + d) };
                        let v = nx >= 0 && ny >= 0 && nx < w && ny < h && src[(ny * w + nx) as usize];
                        if erode {
                            acc &= v;
                        } else {
                            acc |= v;
                        }
                    }
                    out[(y * w + x) as usize] = acc;
                }
            }
            out
        };

        let rows = pass(&self.data, true);
        Mask {
            width: self.width,
            height: self.height,
            data: pass(&rows, false),
        }
    }

    /// 8 连通标记
    pub fn components(&self) -> Vec<Component> {
        let (w, h) = (self.width as i64, self.height as i64);
        let mut visited = vec![false; self.data.len()];
        let mut components = Vec::new();

        for start in 0..self.data.len() {
            if !self.data[start] || visited[start] {
                continue;
            }

            let mut pixels = Vec::new();
            let mut perimeter = 0;
            let mut queue = VecDeque::from([start]);
            visited[start] = true;

            while let Some(idx) = queue.pop_front() {
                pixels.push(idx);
                let (x, y) = ((idx as i64) % w, (idx as i64) / w);

                for (dx, dy) in [(1, 0), (-1, 0), (0, 1), (0, -1)] {
                    let (nx, ny) = (x + dx, y + dy);
                    if nx < 0 || ny < 0 || nx >= w || ny >= h || !self.data[(ny * w + nx) as usize] {
                        perimeter += 1;
                    }
                }

                for dy in -1..=1 {
                    for dx in -1..=1 {
                        let (nx, ny) = (x + dx, y + dy);
                        if (dx == 0 && dy == 0) || nx < 0 || ny < 0 || nx >= w || ny >= h {
                            continue;
                        }
                        let n = (ny * w + nx) as usize;
                        if self.data[n] && !visited[n] {
                            visited[n] = true;
                            queue.push_back(n);
                        }
                    }
                }
            }

            components.push(Component { pixels, perimeter });
        }

        components
    }

    /// 只保留满足条件的目标
    pub fn retain<F>(&self, keep: F) -> Mask
    where
        F: Fn(&Component) -> bool,
    {
        let mut out = Mask::new(self.width, self.height);
        for component in self.components().iter().filter(|c| keep(c)) {
            for idx in &component.pixels {
                out.data[*idx] = true;
            }
        }
        out
    }
}
